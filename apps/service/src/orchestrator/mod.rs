/// Orchestrator module - coordinates all components
///
/// The orchestrator is the core coordinator that:
/// - Opens the store selected by configuration
/// - Wires the probe registry, check pipeline and scheduler together
/// - Owns the notification supervisor and shuts everything down in order


use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::database::{self, Database};
use crate::monitoring::{CheckPipeline, CheckerRegistry, MonitoringExecutor, MonitoringScheduler, StatusBroadcaster};
use crate::notifications::{DestinationBackend, NotificationDispatcher, NotificationQueue, UrlDestinationBackend};

/// Main orchestrator for the uptime monitor
pub struct Orchestrator {
    database: Arc<dyn Database>,
    pipeline: Arc<CheckPipeline>,
    scheduler: Arc<MonitoringScheduler>,
    cancel: CancellationToken,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Create and run until Ctrl-C
    pub async fn start(config: Config) -> Result<()> {
        let orchestrator = Self::new(config).await?;
        orchestrator.run().await
    }

    /// Build every component from configuration
    pub async fn new(config: Config) -> Result<Self> {
        info!("Opening {} database...", config.database.backend);
        let database = database::connect(&config.database).await?;

        let backend = Arc::new(UrlDestinationBackend::new(Duration::from_secs(
            config.notifications.send_timeout_seconds.max(1),
        ))?);

        Self::with_parts(config, database, backend, CheckerRegistry::with_defaults()?)
    }

    /// Assemble from already-built parts
    ///
    /// Must be called inside a tokio runtime: the notification supervisor is
    /// spawned here.
    pub fn with_parts(
        config: Config,
        database: Arc<dyn Database>,
        backend: Arc<dyn DestinationBackend>,
        registry: CheckerRegistry,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();

        let dispatcher = Arc::new(NotificationDispatcher::new(database.clone(), backend, &config.notifications)?);
        let (queue, dispatcher_handle) = dispatcher.start(cancel.child_token());

        let pipeline = Arc::new(Self::build_pipeline(&config, database.clone(), registry, queue));
        let scheduler = Arc::new(MonitoringScheduler::new(database.clone(), pipeline.clone()));

        Ok(Self {
            database,
            pipeline,
            scheduler,
            cancel,
            dispatcher_handle: Some(dispatcher_handle),
        })
    }

    fn build_pipeline(
        config: &Config,
        database: Arc<dyn Database>,
        registry: CheckerRegistry,
        queue: NotificationQueue,
    ) -> CheckPipeline {
        info!(kinds = ?registry.kinds(), "Probe strategies registered");
        let executor = MonitoringExecutor::new(registry, config.monitoring.default_timeout_seconds);
        CheckPipeline::new(
            executor,
            database,
            StatusBroadcaster::default(),
            queue,
            config.monitoring.slow_response_threshold_ms,
        )
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn pipeline(&self) -> &Arc<CheckPipeline> {
        &self.pipeline
    }

    /// Shared with whatever adds or removes monitors at runtime
    pub fn scheduler(&self) -> &Arc<MonitoringScheduler> {
        &self.scheduler
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        self.pipeline.broadcaster()
    }

    /// Start the scheduler and block until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let installed = self.scheduler.start().await?;
        info!(installed, "Uptime monitor running, press Ctrl-C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop timers, then let queued notification work drain
    pub async fn shutdown(mut self) {
        info!("Shutting down...");
        self.scheduler.stop().await;
        self.cancel.cancel();

        if let Some(handle) = self.dispatcher_handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Notification dispatcher task failed");
            }
        }
        info!("Shutdown complete");
    }
}
