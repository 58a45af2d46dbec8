use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::error::EngineError;
use crate::monitoring::checker::ping_address;
use crate::monitoring::history::HistoryRing;
use crate::monitoring::types::{MonitorStatus, ProbeKind};

/// Longest accepted check interval, thirty days
pub const MAX_INTERVAL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Monitor model - a target health-checked on a fixed interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub kind: ProbeKind,
    pub interval_seconds: u64,
    pub status: MonitorStatus,
    pub last_check: Option<DateTime<Utc>>,
    /// Maintenance mode, a suspended monitor is never probed
    pub suspended: bool,
    pub public: bool,
    pub history: HistoryRing,
    pub created_at: DateTime<Utc>,
    /// Bumped on every maintenance toggle so results of probes dispatched
    /// before the toggle can be told apart.
    #[serde(skip)]
    pub epoch: u64,
}

impl Monitor {
    /// Create a new monitor from a validated configuration
    pub fn new(config: NewMonitor, now: DateTime<Utc>) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            name: config.name.trim().to_string(),
            target: config.target.trim().to_string(),
            kind: config.kind,
            interval_seconds: config.interval_seconds,
            status: MonitorStatus::Pending,
            last_check: None,
            suspended: false,
            public: config.public,
            history: HistoryRing::new(),
            created_at: now,
            epoch: 0,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Whether the scheduler should probe this monitor at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.suspended {
            return false;
        }
        match self.last_check {
            None => true,
            Some(last_check) => {
                let Some(interval_ms) = i64::try_from(self.interval_seconds)
                    .ok()
                    .and_then(|seconds| seconds.checked_mul(1000))
                else {
                    return false;
                };
                now.signed_duration_since(last_check).num_milliseconds() >= interval_ms
            }
        }
    }

    /// Enter maintenance: probing halts and the status is forced to
    /// `maintenance`. Open incidents are left untouched.
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.status = MonitorStatus::Maintenance;
        self.epoch += 1;
    }

    /// Leave maintenance: the next probe treats the monitor as freshly onboarded
    pub fn resume(&mut self) {
        self.suspended = false;
        self.status = MonitorStatus::Pending;
        self.epoch += 1;
    }
}

/// Validated input for adding a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMonitor {
    pub name: String,
    pub target: String,
    pub kind: ProbeKind,
    pub interval_seconds: u64,
    #[serde(default = "default_public")]
    pub public: bool,
}

fn default_public() -> bool {
    true
}

impl NewMonitor {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: ProbeKind,
        interval_seconds: u64,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            interval_seconds,
            public: default_public(),
        }
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidMonitor("name must not be empty".to_string()));
        }
        if self.interval_seconds == 0 {
            return Err(EngineError::InvalidMonitor(
                "interval must be at least one second".to_string(),
            ));
        }
        if self.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(EngineError::InvalidMonitor(format!(
                "interval must not exceed {MAX_INTERVAL_SECONDS} seconds"
            )));
        }

        let target = self.target.trim();
        match self.kind {
            ProbeKind::Http => {
                let url = Url::parse(target)
                    .map_err(|e| EngineError::InvalidMonitor(format!("invalid URL {target}: {e}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(EngineError::InvalidMonitor(format!(
                        "invalid scheme for HTTP monitor: {}",
                        url.scheme()
                    )));
                }
                if url.host_str().is_none() {
                    return Err(EngineError::InvalidMonitor(format!("{target} has no host")));
                }
            }
            ProbeKind::Ping => {
                ping_address(target).map_err(|e| EngineError::InvalidMonitor(e.to_string()))?;
            }
        }

        Ok(())
    }
}
