//! Uptime monitor engine: per-monitor probe scheduling, status-transition
//! classification and notification dispatch.

pub mod cli;
pub mod config;
pub mod database;
pub mod monitoring;
pub mod notifications;
pub mod orchestrator;
pub mod pool;

pub use config::Config;
pub use orchestrator::Orchestrator;
