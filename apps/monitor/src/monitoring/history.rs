//! Bounded per-monitor history of check results.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::types::{CheckResult, ProbeStatus};

/// Number of checks retained per monitor
pub const HISTORY_LIMIT: usize = 50;

/// Append-only sequence of check results, oldest first, evicting from the
/// head once it grows past [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryRing {
    entries: VecDeque<CheckResult>,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(HISTORY_LIMIT) }
    }

    /// Rebuild a ring from stored results (oldest first), keeping the newest
    /// [`HISTORY_LIMIT`] entries.
    pub fn from_results(results: impl IntoIterator<Item = CheckResult>) -> Self {
        let mut ring = Self::new();
        for result in results {
            ring.append(result);
        }
        ring
    }

    pub fn append(&mut self, result: CheckResult) {
        self.entries.push_back(result);
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CheckResult> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&CheckResult> {
        self.entries.back()
    }

    /// The newest `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<CheckResult> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Arithmetic mean of latency over all retained entries, 0 when empty
    pub fn average_latency(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let total: u64 = self.entries.iter().map(|entry| entry.latency_ms).sum();
        total as f64 / self.entries.len() as f64
    }

    /// Fraction of retained entries that were up, 0 when empty
    pub fn uptime_ratio(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let up = self.entries.iter().filter(|entry| entry.status == ProbeStatus::Up).count();
        up as f64 / self.entries.len() as f64
    }
}
