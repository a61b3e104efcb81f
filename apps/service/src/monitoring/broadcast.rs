use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use super::events::AlertEvent;
use super::types::MonitorStatus;

/// Notice published after every persisted check, for live viewers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStateChange {
    pub monitor_id: i64,
    pub monitor_name: String,
    /// `None` when this is the monitor's first check
    pub previous: Option<MonitorStatus>,
    pub current: MonitorStatus,
    pub latency_ms: u64,
    pub event: Option<AlertEvent>,
    pub checked_at: DateTime<Utc>,
}

/// In-process fan-out to whatever real-time transport is attached
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<MonitorStateChange>,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorStateChange> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Fire and forget; having no subscribers is fine
    pub fn publish(&self, change: MonitorStateChange) {
        trace!(monitor_id = change.monitor_id, current = %change.current, "Publishing state change");
        let _ = self.tx.send(change);
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(monitor_id: i64) -> MonitorStateChange {
        MonitorStateChange {
            monitor_id,
            monitor_name: "api".into(),
            previous: None,
            current: MonitorStatus::Up,
            latency_ms: 12,
            event: Some(AlertEvent::MonitorUp),
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let broadcaster = StatusBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.publish(change(1));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_the_change() {
        let broadcaster = StatusBroadcaster::new(8);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.publish(change(4));
        assert_eq!(a.recv().await.unwrap().monitor_id, 4);
        assert_eq!(b.recv().await.unwrap().event, Some(AlertEvent::MonitorUp));
    }
}
