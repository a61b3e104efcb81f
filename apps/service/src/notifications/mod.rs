//! Alert delivery: subscription resolution, message rendering and fan-out to
//! destination URLs.

pub mod backend;
pub mod dispatcher;
pub mod message;
pub mod senders;

pub use backend::{DestinationBackend, UrlDestinationBackend};
pub use dispatcher::{DispatchReport, NotificationDispatcher, NotificationQueue};
pub use message::MessageRenderer;
pub use senders::{SenderError, ServiceInfo, create_sender, supported_services, validate_destination};

use crate::database::models::Monitor;
use crate::monitoring::events::AlertEvent;
use crate::monitoring::types::{CheckResult, MonitorStatus};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("failed to load channels: {0}")]
    Store(#[source] anyhow::Error),
    #[error("failed to render message: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Sender(#[from] SenderError),
}

/// Everything needed to notify about one classified check
#[derive(Debug, Clone)]
pub struct Alert {
    pub event: AlertEvent,
    pub monitor: Monitor,
    pub check: CheckResult,
    /// Status of the check before this one, `None` on the first check
    pub previous: Option<MonitorStatus>,
}
