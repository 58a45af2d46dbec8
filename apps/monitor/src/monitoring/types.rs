use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derived health status of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    /// Freshly created or resumed, no probe result yet
    Pending,
    /// Reserved for external admin action, never set by the engine
    Paused,
    /// Suspended, never probed
    Maintenance,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
            MonitorStatus::Pending => write!(f, "pending"),
            MonitorStatus::Paused => write!(f, "paused"),
            MonitorStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(MonitorStatus::Up),
            "down" => Ok(MonitorStatus::Down),
            "pending" => Ok(MonitorStatus::Pending),
            "paused" => Ok(MonitorStatus::Paused),
            "maintenance" => Ok(MonitorStatus::Maintenance),
            other => Err(format!("unknown monitor status: {other}")),
        }
    }
}

/// Outcome of a single probe. Only the up/down edge exists at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl From<ProbeStatus> for MonitorStatus {
    fn from(status: ProbeStatus) -> Self {
        match status {
            ProbeStatus::Up => MonitorStatus::Up,
            ProbeStatus::Down => MonitorStatus::Down,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        MonitorStatus::from(*self).fmt(f)
    }
}

impl FromStr for ProbeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ProbeStatus::Up),
            "down" => Ok(ProbeStatus::Down),
            other => Err(format!("unknown probe status: {other}")),
        }
    }
}

/// Kind of reachability probe to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Http,
    Ping,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Http => write!(f, "http"),
            ProbeKind::Ping => write!(f, "ping"),
        }
    }
}

impl FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" | "https" => Ok(ProbeKind::Http),
            "ping" => Ok(ProbeKind::Ping),
            other => Err(format!("unsupported probe kind: {other}")),
        }
    }
}

/// Result of a monitoring check. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Time the probe was dispatched
    pub timestamp: DateTime<Utc>,

    pub status: ProbeStatus,

    /// Wall-clock time from dispatch to response or failure
    pub latency_ms: u64,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,

    /// Diagnostic message, set on failures and on successful HTTP probes
    pub message: Option<String>,
}

impl CheckResult {
    /// Build a successful check result
    pub fn up(timestamp: DateTime<Utc>, latency_ms: u64) -> Self {
        Self { timestamp, status: ProbeStatus::Up, latency_ms, status_code: None, message: None }
    }

    /// Build a failed check result
    pub fn down(timestamp: DateTime<Utc>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            status: ProbeStatus::Down,
            latency_ms,
            status_code: None,
            message: Some(message.into()),
        }
    }

    pub fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}
