use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::monitor::Monitor;

/// A recorded interval of a monitor being down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub monitor_id: Uuid,
    /// Name at the time the incident opened, kept even if the monitor is
    /// renamed or deleted later
    pub monitor_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cause: Option<String>,
    pub resolved: bool,
}

impl Incident {
    pub fn open(monitor: &Monitor, started_at: DateTime<Utc>, cause: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            monitor_id: monitor.id,
            monitor_name: monitor.name.clone(),
            started_at,
            ended_at: None,
            cause,
            resolved: false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    /// Time from start to resolution, None while the incident is open
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|ended_at| ended_at - self.started_at)
    }
}
