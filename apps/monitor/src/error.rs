use thiserror::Error;
use uuid::Uuid;

use crate::database::PersistenceError;
use crate::ledger::LedgerError;

/// Errors surfaced by the engine's management surface.
///
/// Probe and notification failures never appear here: the former become
/// `down` results, the latter are logged and dropped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("monitor {0} not found")]
    MonitorNotFound(Uuid),

    #[error("invalid monitor configuration: {0}")]
    InvalidMonitor(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("incident ledger is inconsistent: {0}")]
    Ledger(#[from] LedgerError),
}
