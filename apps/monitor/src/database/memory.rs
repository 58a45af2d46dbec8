use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{PersistenceError, Snapshot, StateStore};

/// In-memory state store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`, as if a previous run had saved it
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot: Mutex::new(Some(snapshot)), ..Self::default() }
    }

    /// Make every subsequent load and save fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Last successfully saved snapshot
    pub fn saved(&self) -> Option<Snapshot> {
        self.snapshot.lock().ok().and_then(|guard| guard.clone())
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        self.check_available()?;
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        *guard = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
