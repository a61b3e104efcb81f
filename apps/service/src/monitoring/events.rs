//! Alert events derived from consecutive check states.
//!
//! Events are never persisted: they are a pure function of the previous
//! status, the current status, the measured latency and the slow-response
//! threshold.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::types::MonitorStatus;

/// Kind of alert a status transition produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertEvent {
    MonitorUp,
    MonitorDown,
    Recovery,
    ResponseSlow,
}

/// Events a channel receives when it does not list any explicitly.
pub const DEFAULT_EVENTS: [AlertEvent; 3] =
    [AlertEvent::MonitorUp, AlertEvent::MonitorDown, AlertEvent::Recovery];

impl AlertEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEvent::MonitorUp => "monitor_up",
            AlertEvent::MonitorDown => "monitor_down",
            AlertEvent::Recovery => "recovery",
            AlertEvent::ResponseSlow => "response_slow",
        }
    }

    /// Emoji and title used in rendered notifications.
    pub fn headline(&self) -> (&'static str, &'static str) {
        match self {
            AlertEvent::MonitorUp => ("✅", "Monitor UP"),
            AlertEvent::MonitorDown => ("🔴", "Monitor DOWN"),
            AlertEvent::Recovery => ("🔄", "Monitor Recovered"),
            AlertEvent::ResponseSlow => ("🐢", "Slow Response"),
        }
    }
}

impl std::fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for AlertEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "monitor_up" | "up" => Ok(AlertEvent::MonitorUp),
            "monitor_down" | "down" => Ok(AlertEvent::MonitorDown),
            "recovery" => Ok(AlertEvent::Recovery),
            "response_slow" | "slow" => Ok(AlertEvent::ResponseSlow),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

/// Determine which alert, if any, a new check should raise.
///
/// Rules are evaluated in order and the first match wins:
/// 1. down → up is a recovery
/// 2. up → down is a down alert
/// 3. unknown → up is an up alert
/// 4. unknown → down is a down alert
/// 5. an up check slower than a non-zero threshold is a slow response
///
/// Everything else (unchanged status under the threshold, anything ending in
/// unknown) raises nothing.
pub fn classify(
    current: MonitorStatus,
    previous: MonitorStatus,
    latency_ms: u64,
    slow_threshold_ms: u64,
) -> Option<AlertEvent> {
    use MonitorStatus::{Down, Unknown, Up};

    match (previous, current) {
        (Down, Up) => Some(AlertEvent::Recovery),
        (Up, Down) => Some(AlertEvent::MonitorDown),
        (Unknown, Up) => Some(AlertEvent::MonitorUp),
        (Unknown, Down) => Some(AlertEvent::MonitorDown),
        (_, Up) if slow_threshold_ms > 0 && latency_ms > slow_threshold_ms => {
            Some(AlertEvent::ResponseSlow)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MonitorStatus::{Down, Unknown, Up};

    /// Straight transcription of the rule table, evaluated top to bottom.
    fn expected(current: MonitorStatus, previous: MonitorStatus, latency: u64, threshold: u64) -> Option<AlertEvent> {
        if previous == Down && current == Up {
            return Some(AlertEvent::Recovery);
        }
        if previous == Up && current == Down {
            return Some(AlertEvent::MonitorDown);
        }
        if previous == Unknown && current == Up {
            return Some(AlertEvent::MonitorUp);
        }
        if previous == Unknown && current == Down {
            return Some(AlertEvent::MonitorDown);
        }
        if current == Up && threshold > 0 && latency > threshold {
            return Some(AlertEvent::ResponseSlow);
        }
        None
    }

    #[test]
    fn test_classify_matches_rule_table_over_domain() {
        let statuses = [Up, Down, Unknown];
        let latencies = [0, 1, 499, 500, 501, 4999, 5000, 5001, 6000, u64::MAX];
        let thresholds = [0, 1, 500, 5000, u64::MAX];

        for current in statuses {
            for previous in statuses {
                for latency in latencies {
                    for threshold in thresholds {
                        let first = classify(current, previous, latency, threshold);
                        let second = classify(current, previous, latency, threshold);
                        assert_eq!(first, second, "classify must be deterministic");
                        assert_eq!(
                            first,
                            expected(current, previous, latency, threshold),
                            "current={current} previous={previous} latency={latency} threshold={threshold}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_recovery_never_reported_as_up() {
        assert_eq!(classify(Up, Down, 10, 5000), Some(AlertEvent::Recovery));
        // even when slow, a recovery stays a recovery
        assert_eq!(classify(Up, Down, 9000, 5000), Some(AlertEvent::Recovery));
    }

    #[test]
    fn test_slow_response_respects_disabled_threshold() {
        assert_eq!(classify(Up, Up, 6000, 5000), Some(AlertEvent::ResponseSlow));
        assert_eq!(classify(Up, Up, 6000, 0), None);
        assert_eq!(classify(Up, Up, 5000, 5000), None);
    }

    #[test]
    fn test_unknown_endings_raise_nothing() {
        for previous in [Up, Down, Unknown] {
            assert_eq!(classify(Unknown, previous, 10_000, 1), None);
        }
        assert_eq!(classify(Down, Down, 10_000, 1), None);
    }

    #[test]
    fn test_event_names_and_aliases() {
        assert_eq!("monitor_up".parse::<AlertEvent>().unwrap(), AlertEvent::MonitorUp);
        assert_eq!("down".parse::<AlertEvent>().unwrap(), AlertEvent::MonitorDown);
        assert_eq!("slow".parse::<AlertEvent>().unwrap(), AlertEvent::ResponseSlow);
        assert_eq!(" recovery ".parse::<AlertEvent>().unwrap(), AlertEvent::Recovery);
        assert!("ssl_expiring".parse::<AlertEvent>().is_err());

        let json = serde_json::to_string(&AlertEvent::ResponseSlow).unwrap();
        assert_eq!(json, "\"response_slow\"");
    }
}
