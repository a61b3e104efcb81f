use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Libsql,
    Memory,
}

impl DatabaseBackend {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "libsql" | "sqlite" => Some(Self::Libsql),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Libsql => f.write_str("libsql"),
            DatabaseBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub path: String,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { backend: DatabaseBackend::Libsql, path: "uptime-monitor.db".into(), pool_size: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Latency above which an up check raises `response_slow`; 0 disables
    pub slow_response_threshold_ms: u64,
    /// Used for monitors whose own timeout is 0
    pub default_timeout_seconds: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { slow_response_threshold_ms: 5000, default_timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub max_concurrent_sends: usize,
    pub send_timeout_seconds: u64,
    pub queue_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { max_concurrent_sends: 16, send_timeout_seconds: 30, queue_capacity: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `compact` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime-monitor/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-monitor/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Backend", &self.database.backend)?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Slow Response Threshold (ms)", &self.monitoring.slow_response_threshold_ms)?;
        write_1(f, "Default Timeout (s)", &self.monitoring.default_timeout_seconds)?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Max Concurrent Sends", &self.notifications.max_concurrent_sends)?;
        write_1(f, "Send Timeout (s)", &self.notifications.send_timeout_seconds)?;
        write_1(f, "Queue Capacity", &self.notifications.queue_capacity)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptime-monitor/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// let cfg = uptime_monitor::config::Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), uptime_monitor::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply `DB_TYPE`, `DB_NAME`, `SLOW_RESPONSE_THRESHOLD_MS` and `MONITOR_TIMEOUT`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("DB_TYPE") {
            self.database.backend = DatabaseBackend::from_name(&value)
                .ok_or(ConfigError::InvalidOverride { key: "DB_TYPE", value })?;
        }
        if let Some(value) = lookup("DB_NAME") {
            self.database.path = value;
        }
        if let Some(value) = lookup("SLOW_RESPONSE_THRESHOLD_MS") {
            self.monitoring.slow_response_threshold_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "SLOW_RESPONSE_THRESHOLD_MS", value })?;
        }
        if let Some(value) = lookup("MONITOR_TIMEOUT") {
            self.monitoring.default_timeout_seconds = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "MONITOR_TIMEOUT", value })?;
        }
        Ok(())
    }
}
