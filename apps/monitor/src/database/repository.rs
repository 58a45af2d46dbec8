use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::{Connection, Row, params};
use std::collections::HashMap;
use uuid::Uuid;

use super::{PersistenceError, Snapshot, StateStore, initialize_database};
use crate::models::{Incident, Monitor, Settings};
use crate::monitoring::history::HistoryRing;
use crate::monitoring::types::{CheckResult, MonitorStatus, ProbeKind, ProbeStatus};
use crate::pool::{LibsqlManager, LibsqlPool};

/// LibSQL-backed state store
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    /// Create a store from a pool, running migrations first
    pub async fn new(pool: LibsqlPool) -> Result<Self, PersistenceError> {
        let store = Self { pool };
        let conn = store.get_conn().await?;
        initialize_database(&conn).await?;
        Ok(store)
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, PersistenceError> {
        self.pool.get().await.map_err(|e| PersistenceError::Pool(e.to_string()))
    }

    async fn load_history(
        conn: &Connection,
    ) -> Result<HashMap<Uuid, Vec<CheckResult>>, PersistenceError> {
        let mut rows = conn
            .query(
                "SELECT monitor_id, timestamp, status, latency_ms, status_code, message
                 FROM check_history ORDER BY monitor_id, seq",
                (),
            )
            .await?;

        let mut history: HashMap<Uuid, Vec<CheckResult>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let monitor_id = parse_uuid(&row, 0, "check_history")?;
            let status: String = row.get(2)?;
            history.entry(monitor_id).or_default().push(CheckResult {
                timestamp: from_nanos(row.get(1)?),
                status: status
                    .parse::<ProbeStatus>()
                    .map_err(|reason| corrupt("check_history", reason))?,
                latency_ms: row.get::<i64>(3)?.max(0) as u64,
                status_code: row.get::<Option<i64>>(4)?.map(|code| code as u16),
                message: row.get(5)?,
            });
        }
        Ok(history)
    }

    async fn load_monitors(conn: &Connection) -> Result<Vec<Monitor>, PersistenceError> {
        let mut history = Self::load_history(conn).await?;

        let mut rows = conn
            .query(
                "SELECT id, name, target, kind, interval_seconds, status, last_check, suspended, public, created_at
                 FROM monitors ORDER BY position",
                (),
            )
            .await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            let id = parse_uuid(&row, 0, "monitors")?;
            let kind: String = row.get(3)?;
            let status: String = row.get(5)?;

            monitors.push(Monitor {
                id,
                name: row.get(1)?,
                target: row.get(2)?,
                kind: kind.parse::<ProbeKind>().map_err(|reason| corrupt("monitors", reason))?,
                interval_seconds: parse_interval(row.get(4)?)?,
                status: status
                    .parse::<MonitorStatus>()
                    .map_err(|reason| corrupt("monitors", reason))?,
                last_check: row.get::<Option<i64>>(6)?.map(from_nanos),
                suspended: row.get::<i64>(7)? != 0,
                public: row.get::<i64>(8)? != 0,
                history: HistoryRing::from_results(history.remove(&id).unwrap_or_default()),
                created_at: from_nanos(row.get(9)?),
                epoch: 0,
            });
        }
        Ok(monitors)
    }

    async fn load_incidents(conn: &Connection) -> Result<Vec<Incident>, PersistenceError> {
        let mut rows = conn
            .query(
                "SELECT id, monitor_id, monitor_name, started_at, ended_at, cause, resolved
                 FROM incidents ORDER BY started_at",
                (),
            )
            .await?;

        let mut incidents = Vec::new();
        while let Some(row) = rows.next().await? {
            incidents.push(Incident {
                id: parse_uuid(&row, 0, "incidents")?,
                monitor_id: parse_uuid(&row, 1, "incidents")?,
                monitor_name: row.get(2)?,
                started_at: from_nanos(row.get(3)?),
                ended_at: row.get::<Option<i64>>(4)?.map(from_nanos),
                cause: row.get(5)?,
                resolved: row.get::<i64>(6)? != 0,
            });
        }
        Ok(incidents)
    }

    async fn load_settings(conn: &Connection) -> Result<Option<Settings>, PersistenceError> {
        let mut rows = conn.query("SELECT value FROM settings WHERE id = 1", ()).await?;
        match rows.next().await? {
            Some(row) => {
                let value: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StateStore for LibsqlStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let conn = self.get_conn().await?;

        // The settings row is written by every save, its absence means a
        // fresh database
        let Some(settings) = Self::load_settings(&conn).await? else {
            return Ok(None);
        };

        Ok(Some(Snapshot {
            monitors: Self::load_monitors(&conn).await?,
            incidents: Self::load_incidents(&conn).await?,
            settings,
        }))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let conn = self.get_conn().await?;
        let settings = serde_json::to_string(&snapshot.settings)?;

        let tx = conn.transaction().await?;

        tx.execute("DELETE FROM check_history", ()).await?;
        tx.execute("DELETE FROM monitors", ()).await?;

        for (position, monitor) in snapshot.monitors.iter().enumerate() {
            let interval = i64::try_from(monitor.interval_seconds).map_err(|_| {
                PersistenceError::Unrepresentable {
                    field: "monitors.interval_seconds",
                    reason: format!("{} does not fit in an i64", monitor.interval_seconds),
                }
            })?;
            tx.execute(
                "INSERT INTO monitors (id, position, name, target, kind, interval_seconds, status, last_check, suspended, public, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.id.to_string(),
                    position as i64,
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.kind.to_string(),
                    interval,
                    monitor.status.to_string(),
                    monitor.last_check.map(|t| to_nanos(t, "monitors.last_check")).transpose()?,
                    if monitor.suspended { 1 } else { 0 },
                    if monitor.public { 1 } else { 0 },
                    to_nanos(monitor.created_at, "monitors.created_at")?
                ],
            )
            .await?;

            for (seq, check) in monitor.history.iter().enumerate() {
                tx.execute(
                    "INSERT INTO check_history (monitor_id, seq, timestamp, status, latency_ms, status_code, message)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        monitor.id.to_string(),
                        seq as i64,
                        to_nanos(check.timestamp, "check_history.timestamp")?,
                        check.status.to_string(),
                        check.latency_ms as i64,
                        check.status_code.map(|code| code as i64),
                        check.message.clone()
                    ],
                )
                .await?;
            }
        }

        for incident in &snapshot.incidents {
            tx.execute(
                "INSERT OR REPLACE INTO incidents (id, monitor_id, monitor_name, started_at, ended_at, cause, resolved)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    incident.id.to_string(),
                    incident.monitor_id.to_string(),
                    incident.monitor_name.clone(),
                    to_nanos(incident.started_at, "incidents.started_at")?,
                    incident.ended_at.map(|t| to_nanos(t, "incidents.ended_at")).transpose()?,
                    incident.cause.clone(),
                    if incident.resolved { 1 } else { 0 }
                ],
            )
            .await?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO settings (id, value, updated_at) VALUES (1, ?, ?)",
            params![settings, Utc::now().timestamp()],
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(
            monitors = snapshot.monitors.len(),
            incidents = snapshot.incidents.len(),
            "Saved state snapshot"
        );
        Ok(())
    }
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::Corrupt { table, reason: reason.into() }
}

fn parse_uuid(row: &Row, idx: i32, table: &'static str) -> Result<Uuid, PersistenceError> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| corrupt(table, format!("invalid id {raw}: {e}")))
}

fn parse_interval(raw: i64) -> Result<u64, PersistenceError> {
    u64::try_from(raw)
        .ok()
        .filter(|seconds| *seconds > 0)
        .ok_or_else(|| corrupt("monitors", format!("invalid interval {raw}")))
}

/// Timestamps are stored as nanoseconds since the Unix epoch so that a
/// reloaded value compares equal to the one that was saved.
fn to_nanos(at: DateTime<Utc>, field: &'static str) -> Result<i64, PersistenceError> {
    at.timestamp_nanos_opt().ok_or_else(|| PersistenceError::Unrepresentable {
        field,
        reason: format!("{at} is outside the nanosecond range"),
    })
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
