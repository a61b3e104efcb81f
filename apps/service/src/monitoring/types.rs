use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status of a monitoring check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
            MonitorStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorStatus {
    type Err = std::convert::Infallible;

    /// Anything that is not `up` or `down` reads back as unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "up" => MonitorStatus::Up,
            "down" => MonitorStatus::Down,
            _ => MonitorStatus::Unknown,
        })
    }
}

/// Result of a monitoring check
///
/// This is the persisted "check" row: append-only, ordered by `checked_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Row id once persisted
    pub id: Option<i64>,

    /// Monitor that was checked
    pub monitor_id: i64,

    /// Status of the check (up/down/unknown)
    pub status: MonitorStatus,

    /// Response time in milliseconds
    pub latency_ms: u64,

    /// Protocol status code (HTTP only)
    pub status_code: Option<u16>,

    /// Human readable outcome, empty when there is nothing to say
    pub message: String,

    /// When the probe started
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    /// Create a new check result with unknown status
    pub fn new(monitor_id: i64, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            monitor_id,
            status: MonitorStatus::Unknown,
            latency_ms: 0,
            status_code: None,
            message: String::new(),
            checked_at,
        }
    }

    pub fn with_outcome(mut self, outcome: ProbeOutcome) -> Self {
        self.status = outcome.status;
        self.status_code = outcome.status_code;
        self.message = outcome.message;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Uniform outcome of a single probe, whatever the protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: MonitorStatus,
    pub status_code: Option<u16>,
    pub message: String,
    /// Replaces the wall-clock latency when the protocol measures its own (ping RTT)
    pub latency_override_ms: Option<u64>,
}

impl ProbeOutcome {
    pub fn up(message: impl Into<String>) -> Self {
        Self {
            status: MonitorStatus::Up,
            status_code: None,
            message: message.into(),
            latency_override_ms: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: MonitorStatus::Down,
            status_code: None,
            message: message.into(),
            latency_override_ms: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: MonitorStatus::Unknown,
            status_code: None,
            message: message.into(),
            latency_override_ms: None,
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_latency_override(mut self, latency_ms: u64) -> Self {
        self.latency_override_ms = Some(latency_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [MonitorStatus::Up, MonitorStatus::Down, MonitorStatus::Unknown] {
            assert_eq!(status.as_str().parse::<MonitorStatus>().unwrap(), status);
        }
        assert_eq!("degraded".parse::<MonitorStatus>().unwrap(), MonitorStatus::Unknown);
    }

    #[test]
    fn test_check_result_takes_outcome() {
        let now = Utc::now();
        let check = CheckResult::new(7, now)
            .with_outcome(ProbeOutcome::down("HTTP 503").with_status_code(503))
            .with_latency(42);

        assert_eq!(check.monitor_id, 7);
        assert_eq!(check.status, MonitorStatus::Down);
        assert_eq!(check.status_code, Some(503));
        assert_eq!(check.message, "HTTP 503");
        assert_eq!(check.latency_ms, 42);
        assert_eq!(check.checked_at, now);
    }
}
