/// Database abstraction layer
///
/// This module provides a unified interface for the engine's storage needs,
/// backed either by LibSQL (SQLite) or by process memory.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod repository;

pub use memory::MemoryDatabase;
pub use repository::{Database, DatabaseImpl};

use anyhow::Result;
use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the store selected by configuration
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
    match config.backend {
        DatabaseBackend::Libsql => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            tracing::info!(path = %config.path, pool_size = config.pool_size, "Opening libsql database");
            Ok(Arc::new(DatabaseImpl::open(&config.path, config.pool_size).await?))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory database, checks will not survive a restart");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}
