use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::checker::CheckerRegistry;
use super::types::{CheckResult, ProbeOutcome};
use crate::database::models::Monitor;

/// Slack added on top of a strategy's own deadline before the probe is abandoned
const DEADLINE_GRACE: Duration = Duration::from_secs(2);

/// Monitoring executor - executes individual monitoring checks
pub struct MonitoringExecutor {
    registry: CheckerRegistry,
    default_timeout: Duration,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor
    pub fn new(registry: CheckerRegistry, default_timeout_seconds: u64) -> Self {
        Self {
            registry,
            default_timeout: Duration::from_secs(default_timeout_seconds.max(1)),
        }
    }

    /// Probe timeout for a monitor, falling back to the configured default
    pub fn timeout_for(&self, monitor: &Monitor) -> Duration {
        if monitor.timeout_seconds == 0 {
            self.default_timeout
        } else {
            Duration::from_secs(monitor.timeout_seconds)
        }
    }

    /// Execute a single probe for `monitor` and build the resulting check
    ///
    /// Never fails: transport problems become a down check, an unregistered
    /// protocol becomes an unknown check without touching the network.
    pub async fn execute_check(&self, monitor: &Monitor) -> CheckResult {
        let checked_at = Utc::now();
        let start = Instant::now();

        let outcome = match self.registry.get(&monitor.kind) {
            Some(checker) => {
                let timeout = self.timeout_for(monitor);
                let deadline = checker.deadline(timeout).saturating_add(DEADLINE_GRACE);

                match tokio::time::timeout(deadline, checker.check(&monitor.target, timeout)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(
                            monitor_id = monitor.id,
                            deadline_ms = deadline.as_millis() as u64,
                            "Probe exceeded its deadline"
                        );
                        ProbeOutcome::down(format!(
                            "probe exceeded deadline of {}ms",
                            deadline.as_millis()
                        ))
                    }
                }
            }
            None => ProbeOutcome::unknown("Unknown monitor type"),
        };

        let latency_ms = outcome
            .latency_override_ms
            .unwrap_or_else(|| start.elapsed().as_millis() as u64);

        CheckResult::new(monitor.id, checked_at)
            .with_outcome(outcome)
            .with_latency(latency_ms)
    }
}
