//! Read models derived from the monitor table: dashboard summary, public
//! status page and search.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Monitor, Settings};
use crate::monitoring::types::MonitorStatus;

/// Dashboard headline numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    /// Share of monitors currently up, as a percentage. 100 with no monitors.
    pub uptime_percentage: f64,
}

impl Summary {
    pub fn from_monitors(monitors: &[Monitor]) -> Self {
        let total = monitors.len();
        let up = monitors.iter().filter(|m| m.status == MonitorStatus::Up).count();
        let down = monitors.iter().filter(|m| m.status == MonitorStatus::Down).count();
        let uptime_percentage =
            if total == 0 { 100.0 } else { up as f64 / total as f64 * 100.0 };

        Self { total, up, down, uptime_percentage }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPageEntry {
    pub id: Uuid,
    pub name: String,
    pub status: MonitorStatus,
    pub uptime_ratio: f64,
    pub average_latency_ms: f64,
}

/// Public status page: only monitors flagged public are listed.
///
/// `all_operational` holds only when every listed monitor is up. Pending and
/// maintenance count against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPage {
    pub title: String,
    pub branding_color: String,
    pub all_operational: bool,
    pub monitors: Vec<StatusPageEntry>,
}

impl StatusPage {
    pub fn build(settings: &Settings, monitors: &[Monitor]) -> Self {
        let monitors: Vec<StatusPageEntry> = monitors
            .iter()
            .filter(|monitor| monitor.public)
            .map(|monitor| StatusPageEntry {
                id: monitor.id,
                name: monitor.name.clone(),
                status: monitor.status,
                uptime_ratio: monitor.history.uptime_ratio(),
                average_latency_ms: monitor.history.average_latency(),
            })
            .collect();

        Self {
            title: settings.status_page_title.clone(),
            branding_color: settings.branding_color.clone(),
            all_operational: monitors.iter().all(|entry| entry.status == MonitorStatus::Up),
            monitors,
        }
    }
}

/// Case-insensitive match on name or target
pub fn matches_query(monitor: &Monitor, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || monitor.name.to_lowercase().contains(&query)
        || monitor.target.to_lowercase().contains(&query)
}
