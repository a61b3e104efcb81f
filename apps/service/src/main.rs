use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use logger::{LogFormat, init_tracing_with};
use uptime_monitor::cli::{Cli, Commands};
use uptime_monitor::config::Config;
use uptime_monitor::database::{self, Database, MemoryDatabase};
use uptime_monitor::notifications::{self, NotificationDispatcher, UrlDestinationBackend};
use uptime_monitor::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::from_config(cli.config.as_deref()).context("loading configuration")?;
    config.apply_env_overrides()?;

    init_tracing_with(&config.logging.level, LogFormat::from_name(&config.logging.format));

    match cli.action() {
        Commands::Run => Orchestrator::start(config).await,
        Commands::Providers => {
            for service in notifications::supported_services() {
                println!("{:<20} {}", service.name, service.description);
                println!("{:<20} format:  {}", "", service.url_format);
                println!("{:<20} example: {}", "", service.example);
            }
            Ok(())
        }
        Commands::Validate { url } => {
            notifications::validate_destination(url)?;
            println!("OK: {url} is a valid notification URL");
            Ok(())
        }
        Commands::TestNotification { url } => {
            let backend = Arc::new(UrlDestinationBackend::new(Duration::from_secs(
                config.notifications.send_timeout_seconds.max(1),
            ))?);
            let dispatcher =
                NotificationDispatcher::new(Arc::new(MemoryDatabase::new()), backend, &config.notifications)?;
            dispatcher.send_test(url).await?;
            println!("Test notification sent");
            Ok(())
        }
        Commands::Stats { monitor_id, hours } => {
            let store = database::connect(&config.database).await?;
            let monitor = store
                .get_monitor(*monitor_id)
                .await?
                .with_context(|| format!("monitor {monitor_id} not found"))?;
            let since = chrono::Utc::now() - chrono::Duration::hours(i64::from(*hours));
            let stats = store.monitor_stats(*monitor_id, since).await?;

            println!("{} ({}) - last {hours}h", monitor.name, monitor.target);
            println!("  Checks:        {}", stats.total_checks);
            println!("  Up / Down:     {} / {}", stats.success_checks, stats.failed_checks);
            match stats.avg_response_time_ms {
                Some(avg) => println!("  Avg response:  {avg:.1}ms"),
                None => println!("  Avg response:  n/a"),
            }
            println!("  Uptime:        {:.2}%", stats.uptime_percent);
            Ok(())
        }
        Commands::Config => {
            print!("{config}");
            Ok(())
        }
    }
}
