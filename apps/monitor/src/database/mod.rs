/// Persistence gateway
///
/// The engine only needs snapshot semantics: load everything at startup,
/// save everything after each applied batch of mutations. Two stores are
/// provided, a LibSQL (SQLite) one for real deployments and an in-memory
/// one for tests and ephemeral runs.

pub mod memory;
pub mod migrations;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::LibsqlStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Incident, Monitor, Settings};

/// Errors that can occur in the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("failed to acquire a database connection: {0}")]
    Pool(String),

    #[error("failed to serialize or deserialize data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{field} cannot be stored: {reason}")]
    Unrepresentable { field: &'static str, reason: String },
}

/// Everything the engine persists, captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub monitors: Vec<Monitor>,
    pub incidents: Vec<Incident>,
    pub settings: Settings,
}

/// Load/save boundary used by the engine
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved snapshot, `None` if nothing was ever saved
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    /// Replace the stored state with `snapshot`
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<(), PersistenceError> {
    migrations::run_migrations(conn).await
}
