use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::events::{AlertEvent, DEFAULT_EVENTS};

/// Monitor model - represents a monitoring target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub target: String,
    /// Protocol kind, the key into the checker registry (`http`, `tcp`, `ping`, ...)
    pub kind: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    /// Persisted for the management layer; the checker makes a single attempt per tick
    pub max_retries: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a new, not yet persisted monitor (id 0)
    pub fn new(name: String, target: String, kind: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            target,
            kind,
            interval_seconds: 60,
            timeout_seconds: 30,
            max_retries: 3,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_interval(mut self, interval_seconds: u64) -> Self {
        self.interval_seconds = interval_seconds;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// Notification channel - one opaque destination URL plus its subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: i64,
    pub name: String,
    /// Provider + credentials + recipient, e.g. `discord://token@id`
    pub url: String,
    /// Subscribed events; empty means the default set
    pub events: Vec<AlertEvent>,
    pub enabled: bool,
}

impl NotificationChannel {
    pub fn new(name: String, url: String) -> Self {
        Self { id: 0, name, url, events: Vec::new(), enabled: true }
    }

    pub fn with_events(mut self, events: Vec<AlertEvent>) -> Self {
        self.events = events;
        self
    }
}

/// Association of a monitor to a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub monitor_id: i64,
    pub channel_id: i64,
    /// Replaces the channel's own subscription for this monitor only
    pub events: Option<Vec<AlertEvent>>,
}

impl Binding {
    pub fn new(monitor_id: i64, channel_id: i64) -> Self {
        Self { monitor_id, channel_id, events: None }
    }

    pub fn with_events(mut self, events: Vec<AlertEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

/// A channel as seen from one monitor, carrying the binding override
#[derive(Debug, Clone, PartialEq)]
pub struct BoundChannel {
    pub channel: NotificationChannel,
    pub override_events: Option<Vec<AlertEvent>>,
}

impl BoundChannel {
    /// Effective subscription: binding override, else channel list, else defaults
    pub fn effective_events(&self) -> &[AlertEvent] {
        match &self.override_events {
            Some(events) if !events.is_empty() => events,
            _ if !self.channel.events.is_empty() => &self.channel.events,
            _ => &DEFAULT_EVENTS,
        }
    }

    pub fn accepts(&self, event: AlertEvent) -> bool {
        self.effective_events().contains(&event)
    }
}

/// Aggregate over a monitor's checks in a time window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub monitor_id: i64,
    pub total_checks: u64,
    pub success_checks: u64,
    pub failed_checks: u64,
    /// Mean of the positive latencies, if any
    pub avg_response_time_ms: Option<f64>,
    pub uptime_percent: f64,
}

impl MonitorStats {
    /// Fold raw check rows into stats
    pub fn from_checks<'a>(monitor_id: i64, checks: impl IntoIterator<Item = &'a crate::monitoring::CheckResult>) -> Self {
        use crate::monitoring::types::MonitorStatus;

        let mut stats = MonitorStats { monitor_id, ..Default::default() };
        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;

        for check in checks {
            stats.total_checks += 1;
            match check.status {
                MonitorStatus::Up => stats.success_checks += 1,
                MonitorStatus::Down => stats.failed_checks += 1,
                MonitorStatus::Unknown => {}
            }
            if check.latency_ms > 0 {
                latency_sum += check.latency_ms;
                latency_count += 1;
            }
        }

        if latency_count > 0 {
            stats.avg_response_time_ms = Some(latency_sum as f64 / latency_count as f64);
        }
        if stats.total_checks > 0 {
            stats.uptime_percent = stats.success_checks as f64 * 100.0 / stats.total_checks as f64;
        }
        stats
    }
}

/// Encode a subscription list for storage
pub fn events_to_json(events: &[AlertEvent]) -> String {
    serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored subscription list, skipping names this build does not know
pub fn events_from_json(raw: &str) -> Vec<AlertEvent> {
    let names: Vec<String> = match serde_json::from_str(raw) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, raw, "Unparsable event list, treating as empty");
            return Vec::new();
        }
    };

    names
        .iter()
        .filter_map(|name| match name.parse::<AlertEvent>() {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unknown event in subscription");
                None
            }
        })
        .collect()
}

/// Convert a timestamp to Unix milliseconds
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert Unix milliseconds to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(channel_events: Vec<AlertEvent>, override_events: Option<Vec<AlertEvent>>) -> BoundChannel {
        BoundChannel {
            channel: NotificationChannel::new("ops".into(), "generic://hooks.example.com/x".into())
                .with_events(channel_events),
            override_events,
        }
    }

    #[test]
    fn test_empty_subscription_gets_defaults_without_slow() {
        let channel = bound(vec![], None);
        assert!(channel.accepts(AlertEvent::MonitorUp));
        assert!(channel.accepts(AlertEvent::MonitorDown));
        assert!(channel.accepts(AlertEvent::Recovery));
        assert!(!channel.accepts(AlertEvent::ResponseSlow));
    }

    #[test]
    fn test_binding_override_replaces_channel_list() {
        let channel = bound(
            vec![AlertEvent::MonitorDown, AlertEvent::Recovery],
            Some(vec![AlertEvent::ResponseSlow]),
        );
        assert!(channel.accepts(AlertEvent::ResponseSlow));
        assert!(!channel.accepts(AlertEvent::MonitorDown));
        assert!(!channel.accepts(AlertEvent::Recovery));
    }

    #[test]
    fn test_empty_override_falls_back_to_channel() {
        let channel = bound(vec![AlertEvent::ResponseSlow], Some(vec![]));
        assert_eq!(channel.effective_events(), &[AlertEvent::ResponseSlow]);
    }

    #[test]
    fn test_event_json_skips_unknown_names() {
        let events = events_from_json(r#"["monitor_down","ssl_expiring","slow"]"#);
        assert_eq!(events, vec![AlertEvent::MonitorDown, AlertEvent::ResponseSlow]);
        assert!(events_from_json("not json").is_empty());
        assert_eq!(events_to_json(&events), r#"["monitor_down","response_slow"]"#);
    }

    #[test]
    fn test_millis_round_trip() {
        let now = millis_to_timestamp(1_700_000_000_123);
        assert_eq!(timestamp_to_millis(now), 1_700_000_000_123);
    }
}
