//! Durable local store: offline cache, pending-action queue, session values.
//!
//! # Responsibility
//! - Own the process-wide local SQLite store behind an explicit handle.
//! - Serialize every access through the store's connection and transactions.
//!
//! # Invariants
//! - The store is opened at most once per handle; concurrent first callers
//!   await the same initialization.
//! - Storage failures are returned to the caller, never swallowed.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cache;
pub mod queue;
pub mod store;

pub use cache::{CacheRead, OfflineCache};
pub use queue::PendingActionQueue;
pub use store::{LocalStore, LocalStoreHandle};

pub type StorageResult<T> = Result<T, StorageError>;

/// Local durable store failure.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidTable(String),
    InvalidData(String),
    /// Opening the store failed or was interrupted.
    Init(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "payload serialization failed: {err}"),
            Self::InvalidTable(table) => write!(f, "invalid table name: `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted local data: {message}"),
            Self::Init(message) => write!(f, "local store initialization failed: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

pub(crate) fn ensure_table(table: &str) -> StorageResult<()> {
    if crate::model::offline::is_valid_table_name(table) {
        Ok(())
    } else {
        Err(StorageError::InvalidTable(table.to_string()))
    }
}
