use std::path::Path;

use redb::{Database as RedbDatabase, ReadableTable, TableDefinition};
use thiserror::Error;

use super::models::StoredSession;
use super::{keys, SessionStore, StoreError};

/// Session keys: key name -> string value
const SESSION: TableDefinition<&str, &str> = TableDefinition::new("session");

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Durable session store backed by a single-table redb database.
pub struct RedbStore {
    db: RedbDatabase,
}

impl RedbStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("session-keeper.redb");
        let db = RedbDatabase::create(db_path)?;

        // Create the table if it doesn't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSION)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn try_read(&self) -> Result<StoredSession, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION)?;

        let get = |key: &str| -> Result<Option<String>, DatabaseError> {
            Ok(table.get(key)?.map(|v| v.value().to_string()))
        };

        Ok(StoredSession {
            access_token: get(keys::ACCESS_TOKEN)?,
            expires_at: get(keys::EXPIRES_AT)?.and_then(|v| v.parse().ok()),
            last_activity: get(keys::LAST_ACTIVITY)?.and_then(|v| v.parse().ok()),
            refresh_token: get(keys::REFRESH_TOKEN)?,
        })
    }

    fn try_persist(&self, snapshot: &StoredSession) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION)?;

            match &snapshot.access_token {
                Some(v) => {
                    table.insert(keys::ACCESS_TOKEN, v.as_str())?;
                }
                None => {
                    table.remove(keys::ACCESS_TOKEN)?;
                }
            }
            match &snapshot.refresh_token {
                Some(v) => {
                    table.insert(keys::REFRESH_TOKEN, v.as_str())?;
                }
                None => {
                    table.remove(keys::REFRESH_TOKEN)?;
                }
            }
            match snapshot.expires_at {
                Some(v) => {
                    table.insert(keys::EXPIRES_AT, v.to_string().as_str())?;
                }
                None => {
                    table.remove(keys::EXPIRES_AT)?;
                }
            }
            match snapshot.last_activity {
                Some(v) => {
                    table.insert(keys::LAST_ACTIVITY, v.to_string().as_str())?;
                }
                None => {
                    table.remove(keys::LAST_ACTIVITY)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn try_clear(&self) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION)?;
            for key in keys::ALL_KEYS {
                table.remove(key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl SessionStore for RedbStore {
    fn read(&self) -> StoredSession {
        match self.try_read() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session store, treating as empty");
                StoredSession::default()
            }
        }
    }

    fn persist(&self, snapshot: &StoredSession) -> Result<(), StoreError> {
        self.try_persist(snapshot)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.try_clear()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
