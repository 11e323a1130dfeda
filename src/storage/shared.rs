use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::StoredSession;
use super::SessionStore;

/// A change made to the shared store by some manager instance.
///
/// `source` identifies the writer; a listener compares it against its own
/// id so that, like browser storage events, a tab never reacts to its own
/// writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub source: Uuid,
}

/// Handle onto the session store shared by every manager instance of the
/// same profile.
///
/// Writes are best-effort: a backend failure (quota, locked file, read-only
/// volume) is logged and swallowed, never propagated. The in-memory
/// session stays authoritative for the rest of the process lifetime.
/// Every write fans a [`StoreChange`] out to all subscribers.
#[derive(Clone)]
pub struct SharedStore {
    backend: Arc<dyn SessionStore>,
    changes: broadcast::Sender<StoreChange>,
}

impl SharedStore {
    pub fn new(backend: Arc<dyn SessionStore>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self { backend, changes }
    }

    /// Read the current snapshot.
    pub fn read(&self) -> StoredSession {
        self.backend.read()
    }

    /// Persist a snapshot on behalf of `source`. Best-effort.
    pub fn persist(&self, source: Uuid, snapshot: &StoredSession) {
        if let Err(e) = self.backend.persist(snapshot) {
            tracing::warn!(error = %e, "Failed to persist session, keeping it in memory only");
        }
        let _ = self.changes.send(StoreChange { source });
    }

    /// Remove all session keys on behalf of `source`. Best-effort.
    pub fn clear(&self, source: Uuid) {
        if let Err(e) = self.backend.clear() {
            tracing::warn!(error = %e, "Failed to clear session store");
        }
        let _ = self.changes.send(StoreChange { source });
    }

    /// Subscribe to changes made through any handle of this store.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn writes_notify_subscribers_with_source() {
        let store = SharedStore::new(Arc::new(MemoryStore::new()));
        let mut rx = store.subscribe();

        let writer = Uuid::new_v4();
        store.persist(
            writer,
            &StoredSession {
                access_token: Some("tok".to_string()),
                expires_at: Some(1),
                last_activity: Some(1),
                refresh_token: None,
            },
        );

        let change = rx.recv().await.unwrap();
        assert_eq!(change.source, writer);
        assert_eq!(store.read().access_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn clear_notifies_and_empties() {
        let store = SharedStore::new(Arc::new(MemoryStore::new()));
        let writer = Uuid::new_v4();
        store.persist(
            writer,
            &StoredSession {
                access_token: Some("tok".to_string()),
                expires_at: Some(1),
                last_activity: Some(1),
                refresh_token: None,
            },
        );

        let mut rx = store.subscribe();
        store.clear(writer);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.source, writer);
        assert!(store.read().is_empty());
    }

    #[tokio::test]
    async fn clones_share_the_backend() {
        let store = SharedStore::new(Arc::new(MemoryStore::new()));
        let other_tab = store.clone();

        store.persist(
            Uuid::new_v4(),
            &StoredSession {
                access_token: Some("tok".to_string()),
                expires_at: Some(1),
                last_activity: Some(1),
                refresh_token: None,
            },
        );

        assert_eq!(other_tab.read().access_token.as_deref(), Some("tok"));
    }
}
