use std::sync::Mutex;

use super::models::StoredSession;
use super::{SessionStore, StoreError};

/// In-memory session store.
///
/// Used in tests and by hosts that run without durable storage; sessions
/// do not survive a process restart.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<StoredSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn read(&self) -> StoredSession {
        self.snapshot.lock().unwrap().clone()
    }

    fn persist(&self, snapshot: &StoredSession) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap() = snapshot.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap() = StoredSession::default();
        Ok(())
    }
}
