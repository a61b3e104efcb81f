//! Command-line arguments

use clap::{Parser, Subcommand};

/// Periodically probes network targets and alerts on state changes
#[derive(Parser, Debug)]
#[command(name = "uptime-monitor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "UPTIME_MONITOR_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the monitoring engine until Ctrl-C (default)
    Run,

    /// List supported notification services
    Providers,

    /// Check a notification URL without sending anything
    Validate {
        /// Destination URL, e.g. discord://token@id
        url: String,
    },

    /// Send a test message to a notification URL
    TestNotification {
        /// Destination URL, e.g. ntfy://ntfy.sh/topic
        url: String,
    },

    /// Show check statistics for a monitor
    Stats {
        /// Monitor id
        monitor_id: i64,

        /// Window size in hours
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },

    /// Print the effective configuration
    Config,
}

impl Cli {
    pub fn action(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_default() {
        let cli = Cli::try_parse_from(["uptime-monitor"]).unwrap();
        assert_eq!(cli.action(), &Commands::Run);
    }

    #[test]
    fn test_stats_hours() {
        let cli = Cli::try_parse_from(["uptime-monitor", "stats", "7", "--hours", "48"]).unwrap();
        assert_eq!(cli.action(), &Commands::Stats { monitor_id: 7, hours: 48 });

        let cli = Cli::try_parse_from(["uptime-monitor", "-c", "/tmp/c.toml", "test-notification", "ntfy://ntfy.sh/x"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert_eq!(cli.action(), &Commands::TestNotification { url: "ntfy://ntfy.sh/x".into() });
    }

    #[test]
    fn test_verify_command() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
