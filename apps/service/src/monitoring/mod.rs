/// Monitoring engine module - turns configured monitors into stored checks
/// and alerts
///
/// This module is responsible for:
/// - Probing targets over HTTP/HTTPS/TCP/ICMP
/// - Scheduling one timer per monitor
/// - Classifying status transitions into alert events
/// - Publishing state changes for live viewers
pub mod broadcast;
pub mod checker;
pub mod events;
pub mod executor;
pub mod pipeline;
pub mod scheduler;
pub mod types;

pub use broadcast::{MonitorStateChange, StatusBroadcaster};
pub use checker::{Checker, CheckerRegistry};
pub use events::{AlertEvent, classify};
pub use executor::MonitoringExecutor;
pub use pipeline::{CheckPipeline, TickOutcome};
pub use scheduler::{MonitoringScheduler, SchedulerError};
pub use types::{CheckResult, MonitorStatus, ProbeOutcome};
