pub mod db;
mod keys;
mod memory;
pub mod models;
mod shared;

use thiserror::Error;

pub use db::RedbStore;
pub use keys::*;
pub use memory::MemoryStore;
pub use models::StoredSession;
pub use shared::{SharedStore, StoreChange};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Durable, profile-scoped persistence for the session keys.
///
/// Implementations may fail on write; callers go through [`SharedStore`],
/// which swallows those failures (inability to persist must never crash the
/// caller; the in-memory session stays authoritative for the rest of the
/// process lifetime).
pub trait SessionStore: Send + Sync + 'static {
    /// Read the current snapshot. Never fails: absent or corrupt values
    /// come back as `None`.
    fn read(&self) -> StoredSession;

    /// Write the full snapshot, removing keys whose value is `None`.
    fn persist(&self, snapshot: &StoredSession) -> Result<(), StoreError>;

    /// Remove all four keys.
    fn clear(&self) -> Result<(), StoreError>;
}
