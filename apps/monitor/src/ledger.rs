//! Incident ledger: creation, tracking and resolution of incidents.
//!
//! The ledger enforces at most one unresolved incident per monitor by
//! construction: opening an incident for a monitor that already has one
//! returns the existing record instead of creating a second.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{Incident, Monitor};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("monitor {0} has more than one unresolved incident")]
    DuplicateOpen(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct IncidentLedger {
    /// Oldest first
    incidents: Vec<Incident>,
}

impl IncidentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from stored incidents, in any order
    pub fn restore(mut incidents: Vec<Incident>) -> Result<Self, LedgerError> {
        let mut open = HashSet::new();
        for incident in incidents.iter().filter(|incident| incident.is_open()) {
            if !open.insert(incident.monitor_id) {
                return Err(LedgerError::DuplicateOpen(incident.monitor_id));
            }
        }
        incidents.sort_by_key(|incident| incident.started_at);
        Ok(Self { incidents })
    }

    /// Open an incident for `monitor`.
    ///
    /// Returns the incident and whether it was newly created. When the
    /// monitor already has an open incident, that one is returned unchanged.
    pub fn open(
        &mut self,
        monitor: &Monitor,
        at: DateTime<Utc>,
        cause: Option<String>,
    ) -> (Incident, bool) {
        if let Some(existing) = self.open_for(monitor.id) {
            return (existing.clone(), false);
        }

        let incident = Incident::open(monitor, at, cause);
        info!(
            target: "uppe::incident",
            incident = %incident.id,
            monitor = %monitor.id,
            name = %monitor.name,
            "Incident opened"
        );
        self.incidents.push(incident.clone());
        (incident, true)
    }

    /// Resolve the open incident of `monitor_id`, if any
    pub fn resolve(&mut self, monitor_id: Uuid, at: DateTime<Utc>) -> Option<Incident> {
        let incident = self
            .incidents
            .iter_mut()
            .rev()
            .find(|incident| incident.monitor_id == monitor_id && incident.is_open())?;

        incident.ended_at = Some(at);
        incident.resolved = true;
        info!(
            target: "uppe::incident",
            incident = %incident.id,
            monitor = %monitor_id,
            duration_secs = incident.duration().map(|d| d.num_seconds()).unwrap_or_default(),
            "Incident resolved"
        );
        Some(incident.clone())
    }

    pub fn open_for(&self, monitor_id: Uuid) -> Option<&Incident> {
        self.incidents
            .iter()
            .rev()
            .find(|incident| incident.monitor_id == monitor_id && incident.is_open())
    }

    /// Most recent first
    pub fn list(&self) -> Vec<Incident> {
        self.incidents.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMonitor;
    use crate::monitoring::types::ProbeKind;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn monitor(name: &str) -> Monitor {
        Monitor::new(NewMonitor::new(name, "https://example.com", ProbeKind::Http, 60), at(0)).unwrap()
    }

    #[test]
    fn test_open_twice_yields_one_incident() {
        let mut ledger = IncidentLedger::new();
        let api = monitor("api");

        let (first, created) = ledger.open(&api, at(60), Some("refused".into()));
        assert!(created);
        let (second, created) = ledger.open(&api, at(120), None);
        assert!(!created);

        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.open_for(api.id).map(|i| i.started_at), Some(at(60)));
    }

    #[test]
    fn test_resolve_sets_end_time() {
        let mut ledger = IncidentLedger::new();
        let api = monitor("api");
        ledger.open(&api, at(60), None);

        let resolved = ledger.resolve(api.id, at(180)).unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.ended_at, Some(at(180)));
        assert_eq!(resolved.duration().map(|d| d.num_seconds()), Some(120));
        assert!(ledger.open_for(api.id).is_none());
    }

    #[test]
    fn test_resolve_without_open_incident_is_noop() {
        let mut ledger = IncidentLedger::new();
        assert!(ledger.resolve(Uuid::new_v4(), at(10)).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_resolved_incidents_are_not_reopened() {
        let mut ledger = IncidentLedger::new();
        let api = monitor("api");
        ledger.open(&api, at(60), None);
        ledger.resolve(api.id, at(120));

        let (incident, created) = ledger.open(&api, at(300), None);
        assert!(created);
        assert_eq!(incident.started_at, at(300));

        let list = ledger.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].started_at, at(300));
        assert_eq!(list[1].ended_at, Some(at(120)));
    }

    #[test]
    fn test_restore_rejects_duplicate_open_incidents() {
        let api = monitor("api");
        let incidents = vec![Incident::open(&api, at(10), None), Incident::open(&api, at(20), None)];

        assert!(matches!(
            IncidentLedger::restore(incidents),
            Err(LedgerError::DuplicateOpen(id)) if id == api.id
        ));
    }

    #[test]
    fn test_restore_orders_by_start() {
        let api = monitor("api");
        let db = monitor("db");
        let mut older = Incident::open(&api, at(10), None);
        older.resolved = true;
        older.ended_at = Some(at(15));
        let newer = Incident::open(&db, at(20), None);

        let ledger = IncidentLedger::restore(vec![newer.clone(), older.clone()]).unwrap();
        assert_eq!(ledger.list(), vec![newer, older]);
    }
}
