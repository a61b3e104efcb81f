use std::sync::Arc;
use tracing::{debug, error, warn};

use super::broadcast::{MonitorStateChange, StatusBroadcaster};
use super::events::{AlertEvent, classify};
use super::executor::MonitoringExecutor;
use super::types::{CheckResult, MonitorStatus};
use crate::database::Database;
use crate::database::models::Monitor;
use crate::notifications::{Alert, NotificationQueue};

/// What one tick produced, mostly for tests and logs
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub check: CheckResult,
    pub previous: Option<MonitorStatus>,
    pub event: Option<AlertEvent>,
}

/// Probe → persist → classify → publish → notify, for one monitor
pub struct CheckPipeline {
    executor: MonitoringExecutor,
    store: Arc<dyn Database>,
    broadcaster: StatusBroadcaster,
    notifications: NotificationQueue,
    slow_threshold_ms: u64,
}

impl CheckPipeline {
    pub fn new(
        executor: MonitoringExecutor,
        store: Arc<dyn Database>,
        broadcaster: StatusBroadcaster,
        notifications: NotificationQueue,
        slow_threshold_ms: u64,
    ) -> Self {
        Self { executor, store, broadcaster, notifications, slow_threshold_ms }
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    /// Run one tick. Returns `None` when the check could not be stored.
    pub async fn run_tick(&self, monitor: &Monitor) -> Option<TickOutcome> {
        let check = self.executor.execute_check(monitor).await;

        // read before the insert so the new check is not its own predecessor
        let previous = match self.store.latest_status(monitor.id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(monitor_id = monitor.id, error = %e, "Failed to read previous status");
                None
            }
        };

        if let Err(e) = self.store.insert_check(&check).await {
            error!(monitor_id = monitor.id, error = %e, "Failed to save check, dropping observation");
            return None;
        }

        let event = classify(
            check.status,
            previous.unwrap_or(MonitorStatus::Unknown),
            check.latency_ms,
            self.slow_threshold_ms,
        );

        debug!(
            monitor_id = monitor.id,
            status = %check.status,
            latency_ms = check.latency_ms,
            event = event.map(|e| e.as_str()),
            "Check completed"
        );

        self.broadcaster.publish(MonitorStateChange {
            monitor_id: monitor.id,
            monitor_name: monitor.name.clone(),
            previous,
            current: check.status,
            latency_ms: check.latency_ms,
            event,
            checked_at: check.checked_at,
        });

        if let Some(event) = event {
            self.notifications.enqueue(Alert {
                event,
                monitor: monitor.clone(),
                check: check.clone(),
                previous,
            });
        }

        Some(TickOutcome { check, previous, event })
    }
}
