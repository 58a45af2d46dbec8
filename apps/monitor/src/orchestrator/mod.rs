/// Orchestrator module - coordinates all components
///
/// The orchestrator is the single owner of the monitor table and the
/// incident ledger:
/// - Decides on every tick which monitors are due and dispatches probes
/// - Applies probe outcomes one at a time, in completion order
/// - Opens and resolves incidents and queues down alerts
/// - Persists a consistent snapshot after every batch of mutations
///
/// Probes never hold the state lock. Only applying their results does, so a
/// slow target cannot hold up any other monitor.
pub mod reports;


pub use reports::{StatusPage, StatusPageEntry, Summary};

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config;
use crate::database::{Snapshot, StateStore};
use crate::diagnostics::{self, DiagnosticContext, Summarizer};
use crate::error::EngineError;
use crate::ledger::IncidentLedger;
use crate::models::{Incident, Monitor, NewMonitor, Settings};
use crate::monitoring::{
    MonitorStatus, MonitoringScheduler, ProbeExecutor, ProbeOutcome, Transition, classify,
};
use crate::notification::NotificationDispatcher;

/// Capacity of the probe outcome channel
const OUTCOME_BUFFER: usize = 256;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub tick: Duration,
    pub max_concurrent_probes: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&config::Engine::default())
    }
}

impl From<&config::Engine> for EngineOptions {
    fn from(engine: &config::Engine) -> Self {
        Self { tick: engine.tick(), max_concurrent_probes: engine.max_concurrent_probes }
    }
}

/// Everything mutated by the engine, guarded by one lock
struct EngineState {
    monitors: Vec<Monitor>,
    ledger: IncidentLedger,
    settings: Settings,
    /// Monitors with a probe dispatched but not yet applied
    in_flight: HashSet<Uuid>,
    /// Set when the last save failed, cleared when a snapshot is taken
    dirty: bool,
}

impl EngineState {
    fn monitor_mut(&mut self, id: Uuid) -> Result<&mut Monitor, EngineError> {
        self.monitors
            .iter_mut()
            .find(|monitor| monitor.id == id)
            .ok_or(EngineError::MonitorNotFound(id))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            monitors: self.monitors.clone(),
            incidents: self.ledger.list(),
            settings: self.settings.clone(),
        }
    }
}

/// A freshly opened incident that still needs to be announced
struct PendingAlert {
    monitor: Monitor,
    incident: Incident,
    settings: Settings,
}

/// Main orchestrator for the monitoring engine
pub struct Orchestrator {
    state: Mutex<EngineState>,
    store: Arc<dyn StateStore>,
    scheduler: MonitoringScheduler,
    outcomes: Mutex<mpsc::Receiver<ProbeOutcome>>,
    dispatcher: NotificationDispatcher,
    summarizer: Arc<dyn Summarizer>,
    save_lock: Mutex<()>,
    tick_period: Duration,
}

impl Orchestrator {
    /// Restore the engine from `store`, starting empty when nothing was saved.
    ///
    /// A store that cannot be read is fatal: running on empty state would
    /// overwrite the stored monitors and incidents on the first save.
    pub async fn load(
        store: Arc<dyn StateStore>,
        executor: Arc<ProbeExecutor>,
        dispatcher: NotificationDispatcher,
        summarizer: Arc<dyn Summarizer>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let snapshot = match store.load().await? {
            Some(snapshot) => {
                info!(
                    monitors = snapshot.monitors.len(),
                    incidents = snapshot.incidents.len(),
                    "Restored engine state"
                );
                snapshot
            }
            None => {
                info!("No saved state found, starting with defaults");
                Snapshot::default()
            }
        };

        let ledger = IncidentLedger::restore(snapshot.incidents)?;
        let mut monitors = snapshot.monitors;
        for monitor in monitors.iter_mut().filter(|monitor| monitor.suspended) {
            monitor.status = MonitorStatus::Maintenance;
        }

        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_BUFFER);
        let scheduler =
            MonitoringScheduler::new(executor, options.max_concurrent_probes, outcome_tx);

        Ok(Self {
            state: Mutex::new(EngineState {
                monitors,
                ledger,
                settings: snapshot.settings,
                in_flight: HashSet::new(),
                dirty: false,
            }),
            store,
            scheduler,
            outcomes: Mutex::new(outcome_rx),
            dispatcher,
            summarizer,
            save_lock: Mutex::new(()),
            tick_period: options.tick,
        })
    }

    /// Drive the engine until `shutdown` resolves.
    ///
    /// On shutdown, in-flight probes are awaited (each is bounded by its
    /// timeout), applied and saved, then queued alerts get until the
    /// dispatcher's flush timeout to go out.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(tick_seconds = self.tick_period.as_secs(), "Starting monitoring engine");

        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        {
            let mut outcomes = self.outcomes.lock().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        if self.state.lock().await.dirty {
                            self.persist().await;
                        }
                        self.tick(Utc::now()).await;
                    }
                    Some(outcome) = outcomes.recv() => {
                        self.apply(outcome).await;
                        while let Ok(outcome) = outcomes.try_recv() {
                            self.apply(outcome).await;
                        }
                        self.persist().await;
                    }
                }
            }
        }

        self.settle().await;
        self.dispatcher.flush().await;
        info!("Monitoring engine stopped");
    }

    /// One due-check pass at `now`. Returns the number of probes dispatched.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let jobs = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let jobs = MonitoringScheduler::due_jobs(&state.monitors, &state.in_flight, now);
            state.in_flight.extend(jobs.iter().map(|job| job.monitor_id));
            jobs
        };

        let dispatched = jobs.len();
        for job in jobs {
            self.scheduler.dispatch(job);
        }

        if dispatched > 0 {
            debug!(dispatched, "Tick dispatched probes");
        }
        dispatched
    }

    /// Wait for every in-flight probe, apply the results and save
    pub async fn settle(&self) {
        {
            let mut outcomes = self.outcomes.lock().await;
            while !self.state.lock().await.in_flight.is_empty() {
                match outcomes.recv().await {
                    Some(outcome) => self.apply(outcome).await,
                    None => break,
                }
            }
        }
        self.persist().await;
    }

    /// Apply one probe outcome and announce the incident it opened, if any
    async fn apply(&self, outcome: ProbeOutcome) {
        let alert = {
            let mut guard = self.state.lock().await;
            Self::apply_outcome(&mut guard, outcome)
        };

        if let Some(alert) = alert {
            self.dispatcher.notify_down(&alert.monitor, &alert.incident, &alert.settings).await;
        }
    }

    fn apply_outcome(state: &mut EngineState, outcome: ProbeOutcome) -> Option<PendingAlert> {
        state.in_flight.remove(&outcome.monitor_id);

        let Some(monitor) = state.monitors.iter_mut().find(|m| m.id == outcome.monitor_id) else {
            debug!(monitor = %outcome.monitor_id, "Discarding result for deleted monitor");
            return None;
        };
        if monitor.suspended || monitor.epoch != outcome.epoch {
            debug!(monitor = %monitor.id, "Discarding result dispatched before maintenance toggle");
            return None;
        }

        let result = outcome.result;
        let previous = monitor.status;
        let new = MonitorStatus::from(result.status);
        let at = result.timestamp;
        let cause = result.message.clone();

        monitor.last_check = Some(at);
        monitor.history.append(result);
        monitor.status = new;

        if previous != new {
            info!(monitor = %monitor.id, name = %monitor.name, from = %previous, to = %new, "Status changed");
        }

        match classify(previous, new) {
            Transition::Opened => {
                let (incident, created) = state.ledger.open(monitor, at, cause);
                if created {
                    return Some(PendingAlert {
                        monitor: monitor.clone(),
                        incident,
                        settings: state.settings.clone(),
                    });
                }
                debug!(monitor = %monitor.id, incident = %incident.id, "Incident already open");
            }
            Transition::Closed => {
                state.ledger.resolve(monitor.id, at);
            }
            Transition::None => {}
        }

        None
    }

    /// Save a snapshot of the current state.
    ///
    /// Failures are logged and leave the engine dirty so the next tick
    /// retries. Saves never overlap and always capture a state in which
    /// every accepted mutation is fully applied.
    async fn persist(&self) {
        let _saving = self.save_lock.lock().await;

        let snapshot = {
            let mut state = self.state.lock().await;
            state.dirty = false;
            state.snapshot()
        };

        if let Err(e) = self.store.save(&snapshot).await {
            error!(error = %e, "Failed to save engine state, will retry on next tick");
            self.state.lock().await.dirty = true;
        }
    }

    pub async fn add_monitor(&self, config: NewMonitor) -> Result<Monitor, EngineError> {
        let monitor = Monitor::new(config, Utc::now())?;
        info!(monitor = %monitor.id, name = %monitor.name, target = %monitor.target, "Monitor added");

        self.state.lock().await.monitors.push(monitor.clone());
        self.persist().await;
        Ok(monitor)
    }

    /// Remove a monitor. Its incidents stay in the ledger.
    pub async fn delete_monitor(&self, id: Uuid) -> Result<Monitor, EngineError> {
        let removed = {
            let mut state = self.state.lock().await;
            let position = state
                .monitors
                .iter()
                .position(|monitor| monitor.id == id)
                .ok_or(EngineError::MonitorNotFound(id))?;
            state.monitors.remove(position)
        };

        info!(monitor = %id, name = %removed.name, "Monitor deleted");
        self.persist().await;
        Ok(removed)
    }

    /// Enter or leave maintenance. Returns the monitor's new status.
    pub async fn toggle_maintenance(&self, id: Uuid) -> Result<MonitorStatus, EngineError> {
        let status = {
            let mut state = self.state.lock().await;
            let monitor = state.monitor_mut(id)?;
            if monitor.suspended {
                monitor.resume();
            } else {
                monitor.suspend();
            }
            info!(
                target: "uppe::incident",
                monitor = %id,
                name = %monitor.name,
                maintenance = monitor.suspended,
                "Maintenance toggled"
            );
            monitor.status
        };

        self.persist().await;
        Ok(status)
    }

    pub async fn set_visibility(&self, id: Uuid, public: bool) -> Result<(), EngineError> {
        self.state.lock().await.monitor_mut(id)?.public = public;
        self.persist().await;
        Ok(())
    }

    pub async fn list_monitors(&self) -> Vec<Monitor> {
        self.state.lock().await.monitors.clone()
    }

    /// Monitors whose name or target contains `query`, ignoring case
    pub async fn search_monitors(&self, query: &str) -> Vec<Monitor> {
        let state = self.state.lock().await;
        state.monitors.iter().filter(|m| reports::matches_query(m, query)).cloned().collect()
    }

    pub async fn get_monitor(&self, id: Uuid) -> Result<Monitor, EngineError> {
        let state = self.state.lock().await;
        state
            .monitors
            .iter()
            .find(|monitor| monitor.id == id)
            .cloned()
            .ok_or(EngineError::MonitorNotFound(id))
    }

    /// All incidents, most recent first
    pub async fn list_incidents(&self) -> Vec<Incident> {
        self.state.lock().await.ledger.list()
    }

    pub async fn get_settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn update_settings(&self, settings: Settings) -> Settings {
        self.state.lock().await.settings = settings.clone();
        info!("Settings updated");
        self.persist().await;
        settings
    }

    pub async fn summary(&self) -> Summary {
        Summary::from_monitors(&self.state.lock().await.monitors)
    }

    pub async fn status_page(&self) -> StatusPage {
        let state = self.state.lock().await;
        StatusPage::build(&state.settings, &state.monitors)
    }

    /// Free-text diagnostic of a monitor's recent checks.
    ///
    /// Only an unknown monitor is an error, summarizer failures come back as
    /// a fallback message.
    pub async fn diagnose(&self, id: Uuid) -> Result<String, EngineError> {
        let context = DiagnosticContext::from_monitor(&self.get_monitor(id).await?);
        Ok(diagnostics::diagnose(self.summarizer.as_ref(), &context).await)
    }

    /// Whether a probe for `id` has been dispatched and not yet applied
    pub async fn is_in_flight(&self, id: Uuid) -> bool {
        self.state.lock().await.in_flight.contains(&id)
    }

    /// Wait for queued alerts to be delivered
    pub async fn flush_notifications(&self) {
        self.dispatcher.flush().await;
    }
}
