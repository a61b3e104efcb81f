//! Process-wide tracing setup shared by the workspace binaries.

use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to compact output for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize tracing with a default level and format.
///
/// `RUST_LOG` still wins over `level`, and `RUST_LOG_FORMAT` wins over `format`.
pub fn init_tracing_with(level: &str, format: LogFormat) {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    initialize_tracing(level, format);
}

fn initialize_tracing(level: LevelFilter, format: LogFormat) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = match var("RUST_LOG_FORMAT") {
        Ok(name) => LogFormat::from_name(&name),
        Err(_) => format,
    };

    let log_layer = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        warn!("Tracing subscriber already initialized, keeping the existing one");
    }
}
