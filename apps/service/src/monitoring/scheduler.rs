use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pipeline::CheckPipeline;
use crate::database::Database;
use crate::database::models::Monitor;

/// Longest accepted check interval (one year)
pub const MAX_INTERVAL_SECONDS: u64 = 366 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("monitor {monitor_id} has an invalid check interval of {interval_seconds}s")]
    InvalidInterval { monitor_id: i64, interval_seconds: u64 },
    #[error("failed to load monitors: {0}")]
    Store(#[source] anyhow::Error),
}

/// Live timer for one monitor
struct ScheduledJob {
    cancel: CancellationToken,
    _timer: JoinHandle<()>,
    /// Held for the duration of a tick; shared with any replacement job
    tick_lock: Arc<Mutex<()>>,
}

/// Monitoring scheduler - owns one independent timer per monitor
pub struct MonitoringScheduler {
    store: Arc<dyn Database>,
    pipeline: Arc<CheckPipeline>,
    jobs: Mutex<HashMap<i64, ScheduledJob>>,
    shutdown: CancellationToken,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(store: Arc<dyn Database>, pipeline: Arc<CheckPipeline>) -> Self {
        Self { store, pipeline, jobs: Mutex::new(HashMap::new()), shutdown: CancellationToken::new() }
    }

    /// Load every active monitor and install its timer
    ///
    /// A monitor that cannot be scheduled is logged and skipped. Returns the
    /// number of installed jobs.
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        let monitors = self.store.get_active_monitors().await.map_err(SchedulerError::Store)?;
        let total = monitors.len();

        let mut installed = 0;
        for monitor in monitors {
            let monitor_id = monitor.id;
            match self.add_monitor(monitor).await {
                Ok(()) => installed += 1,
                Err(e) => warn!(monitor_id, error = %e, "Skipping monitor"),
            }
        }

        info!(installed, total, "Monitoring scheduler started");
        Ok(installed)
    }

    /// Cancel every timer and forget all jobs
    pub async fn stop(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.cancel.cancel();
        }
        info!("Monitoring scheduler stopped");
    }

    /// Install or replace the timer for `monitor.id`
    pub async fn add_monitor(&self, monitor: Monitor) -> Result<(), SchedulerError> {
        if monitor.interval_seconds == 0 || monitor.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(SchedulerError::InvalidInterval {
                monitor_id: monitor.id,
                interval_seconds: monitor.interval_seconds,
            });
        }

        let monitor_id = monitor.id;
        let period = Duration::from_secs(monitor.interval_seconds);
        let mut jobs = self.jobs.lock().await;

        let tick_lock = match jobs.remove(&monitor_id) {
            Some(old) => {
                old.cancel.cancel();
                debug!(monitor_id, "Replacing scheduled monitor");
                old.tick_lock
            }
            None => Arc::new(Mutex::new(())),
        };

        let cancel = self.shutdown.child_token();
        let timer = tokio::spawn(run_timer(
            Arc::new(monitor),
            period,
            self.pipeline.clone(),
            tick_lock.clone(),
            cancel.clone(),
        ));

        jobs.insert(monitor_id, ScheduledJob { cancel, _timer: timer, tick_lock });
        info!(monitor_id, interval_seconds = period.as_secs(), "Monitor scheduled");
        Ok(())
    }

    /// Cancel and forget the timer for `monitor_id`; unknown ids are a no-op
    pub async fn remove_monitor(&self, monitor_id: i64) -> bool {
        match self.jobs.lock().await.remove(&monitor_id) {
            Some(job) => {
                job.cancel.cancel();
                info!(monitor_id, "Monitor unscheduled");
                true
            }
            None => false,
        }
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_scheduled(&self, monitor_id: i64) -> bool {
        self.jobs.lock().await.contains_key(&monitor_id)
    }

    pub async fn scheduled_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.jobs.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Drop for MonitoringScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Tick every `period` until cancelled, the first tick one period from now
async fn run_timer(
    monitor: Arc<Monitor>,
    period: Duration,
    pipeline: Arc<CheckPipeline>,
    tick_lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Ok(guard) = tick_lock.clone().try_lock_owned() else {
                    debug!(monitor_id = monitor.id, "Previous check still running, skipping tick");
                    continue;
                };

                let pipeline = pipeline.clone();
                let monitor = monitor.clone();
                // a cancelled job still lets this tick finish
                tokio::spawn(async move {
                    let _guard = guard;
                    pipeline.run_tick(&monitor).await;
                });
            }
        }
    }
}
