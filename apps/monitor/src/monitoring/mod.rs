pub mod checker;
/// Monitoring engine module - handles execution of monitoring checks
///
/// This module is responsible for:
/// - Executing HTTP and ping-style checks
/// - Keeping the bounded per-monitor check history
/// - Classifying status transitions
/// - Fanning probes out under a concurrency limit
pub mod executor;
pub mod history;
pub mod scheduler;
pub mod transition;
pub mod types;

pub use executor::ProbeExecutor;
pub use history::{HISTORY_LIMIT, HistoryRing};
pub use scheduler::{MonitoringScheduler, ProbeJob, ProbeOutcome};
pub use transition::{Transition, classify};
pub use types::{CheckResult, MonitorStatus, ProbeKind, ProbeStatus};
