use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error};
use uuid::Uuid;

use super::executor::ProbeExecutor;
use super::types::{CheckResult, ProbeKind};
use crate::models::Monitor;

/// One probe to run, captured from a monitor at dispatch time
#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub monitor_id: Uuid,
    pub epoch: u64,
    pub target: String,
    pub kind: ProbeKind,
    pub interval: Duration,
    pub dispatched_at: DateTime<Utc>,
}

impl ProbeJob {
    pub fn for_monitor(monitor: &Monitor, dispatched_at: DateTime<Utc>) -> Self {
        Self {
            monitor_id: monitor.id,
            epoch: monitor.epoch,
            target: monitor.target.clone(),
            kind: monitor.kind,
            interval: monitor.interval(),
            dispatched_at,
        }
    }
}

/// A finished probe on its way back to the coordinator
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub monitor_id: Uuid,
    pub epoch: u64,
    pub result: CheckResult,
}

/// Monitoring scheduler - fans probes out to background tasks.
///
/// At most `max_concurrent` probes run at once, the rest wait for a permit.
/// Results come back over the outcome channel in completion order.
pub struct MonitoringScheduler {
    executor: Arc<ProbeExecutor>,
    permits: Arc<Semaphore>,
    outcome_tx: mpsc::Sender<ProbeOutcome>,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        executor: Arc<ProbeExecutor>,
        max_concurrent: usize,
        outcome_tx: mpsc::Sender<ProbeOutcome>,
    ) -> Self {
        Self { executor, permits: Arc::new(Semaphore::new(max_concurrent.max(1))), outcome_tx }
    }

    /// Monitors that should be probed at `now`.
    ///
    /// A monitor whose previous probe is still in flight is skipped for this
    /// pass, it will be picked up again once its result has been applied.
    pub fn due_jobs(
        monitors: &[Monitor],
        in_flight: &HashSet<Uuid>,
        now: DateTime<Utc>,
    ) -> Vec<ProbeJob> {
        monitors
            .iter()
            .filter(|monitor| monitor.is_due(now))
            .filter(|monitor| {
                let busy = in_flight.contains(&monitor.id);
                if busy {
                    debug!(monitor = %monitor.id, "Previous probe still in flight, skipping");
                }
                !busy
            })
            .map(|monitor| ProbeJob::for_monitor(monitor, now))
            .collect()
    }

    /// Run `job` in the background and report its outcome
    pub fn dispatch(&self, job: ProbeJob) -> tokio::task::JoinHandle<()> {
        let executor = self.executor.clone();
        let permits = self.permits.clone();
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();

            let timeout = executor.timeout_for(job.interval);
            let target = job.target.clone();
            let kind = job.kind;
            let dispatched_at = job.dispatched_at;

            // Probe on its own task so a panicking checker still yields an outcome
            let probe = tokio::spawn(async move {
                executor.probe(&target, kind, timeout, dispatched_at).await
            });
            let result = match probe.await {
                Ok(result) => result,
                Err(e) => {
                    error!(monitor = %job.monitor_id, error = %e, "Probe task failed");
                    CheckResult::down(dispatched_at, 0, format!("probe task failed: {e}"))
                }
            };

            debug!(
                monitor = %job.monitor_id,
                status = %result.status,
                latency_ms = result.latency_ms,
                "Probe finished"
            );

            let outcome = ProbeOutcome { monitor_id: job.monitor_id, epoch: job.epoch, result };
            if let Err(e) = outcome_tx.send(outcome).await {
                debug!("Outcome receiver gone, dropping result: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMonitor;
    use crate::monitoring::checker::{Checker, ProbeError, ProbeSuccess};
    use crate::monitoring::types::ProbeStatus;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn monitor(name: &str, interval: u64) -> Monitor {
        Monitor::new(NewMonitor::new(name, "https://example.com", ProbeKind::Http, interval), at(0))
            .unwrap()
    }

    /// Tracks the highest number of overlapping checks
    #[derive(Default)]
    struct Overlap {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Checker for Overlap {
        async fn check(&self, _target: &str, _timeout: Duration) -> Result<ProbeSuccess, ProbeError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ProbeSuccess { status_code: Some(200) })
        }
    }

    #[test]
    fn test_due_jobs_skip_suspended_busy_and_fresh() {
        let fresh = monitor("fresh", 60);
        let mut checked = monitor("checked", 60);
        checked.last_check = Some(at(30));
        let mut suspended = monitor("suspended", 60);
        suspended.suspend();
        let busy = monitor("busy", 60);

        let in_flight = HashSet::from([busy.id]);
        let monitors = vec![fresh.clone(), checked, suspended, busy];

        let jobs = MonitoringScheduler::due_jobs(&monitors, &in_flight, at(60));
        let ids: Vec<_> = jobs.iter().map(|job| job.monitor_id).collect();
        assert_eq!(ids, vec![fresh.id]);
        assert_eq!(jobs[0].dispatched_at, at(60));
    }

    #[test]
    fn test_short_interval_fires_once_per_pass() {
        let mut fast = monitor("fast", 1);
        fast.last_check = Some(at(0));

        // Fifteen intervals elapsed, still one job
        let jobs = MonitoringScheduler::due_jobs(std::slice::from_ref(&fast), &HashSet::new(), at(15));
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let checker = Arc::new(Overlap::default());
        let executor = Arc::new(ProbeExecutor::with_checkers(
            checker.clone(),
            checker.clone(),
            Duration::from_secs(5),
        ));
        let (tx, mut rx) = mpsc::channel(16);
        let scheduler = MonitoringScheduler::new(executor, 2, tx);

        let monitors: Vec<_> = (0..6).map(|i| monitor(&format!("m{i}"), 60)).collect();
        for job in MonitoringScheduler::due_jobs(&monitors, &HashSet::new(), at(0)) {
            scheduler.dispatch(job);
        }

        let mut seen = HashSet::new();
        for _ in 0..6 {
            let outcome = rx.recv().await.unwrap();
            assert_eq!(outcome.result.status, ProbeStatus::Up);
            seen.insert(outcome.monitor_id);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(checker.peak.load(Ordering::SeqCst), 2);
    }
}
