//! Lazily opened local store handle.
//!
//! # Invariants
//! - `store()` opens the database once; callers racing on first use share one
//!   in-flight open.
//! - A failed open is not memoized; the next caller retries.

use crate::db::{open_db, open_db_in_memory, Schema, SharedConnection};
use crate::offline::{StorageError, StorageResult};
use log::{error, info};
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Opened local store.
pub struct LocalStore {
    conn: SharedConnection,
}

impl LocalStore {
    pub(crate) fn conn(&self) -> &SharedConnection {
        &self.conn
    }

    /// Reads one value from the session partition.
    pub fn session_get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self.conn.with(|conn| {
            conn.query_row(
                "SELECT value FROM session_values WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?;
        Ok(value)
    }

    /// Writes one value to the session partition.
    pub fn session_put(&self, key: &str, value: &str, now_ms: i64) -> StorageResult<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO session_values (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![key, value, now_ms],
            )
        })?;
        Ok(())
    }

    /// Removes one session value. Returns whether it existed.
    pub fn session_delete(&self, key: &str) -> StorageResult<bool> {
        let removed = self.conn.with(|conn| {
            conn.execute("DELETE FROM session_values WHERE key = ?1;", [key])
        })?;
        Ok(removed > 0)
    }
}

/// Process-wide handle to the local store.
///
/// Construct once at startup and share by `Arc`.
pub struct LocalStoreHandle {
    location: StoreLocation,
    cell: OnceCell<LocalStore>,
    opens: AtomicUsize,
}

impl LocalStoreHandle {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_location(StoreLocation::File(path.into()))
    }

    pub fn in_memory() -> Self {
        Self::with_location(StoreLocation::Memory)
    }

    fn with_location(location: StoreLocation) -> Self {
        Self {
            location,
            cell: OnceCell::new(),
            opens: AtomicUsize::new(0),
        }
    }

    /// Returns the opened store, opening it on first use.
    pub async fn store(&self) -> StorageResult<&LocalStore> {
        self.cell.get_or_try_init(|| self.open()).await
    }

    /// Returns whether the store has been opened.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of open attempts performed by this handle.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    async fn open(&self) -> StorageResult<LocalStore> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let location = self.location.clone();
        let opened = tokio::task::spawn_blocking(move || match location {
            StoreLocation::File(path) => open_db(path, Schema::Local),
            StoreLocation::Memory => open_db_in_memory(Schema::Local),
        })
        .await;

        match opened {
            Ok(Ok(conn)) => {
                info!("event=local_store_init module=offline status=ok");
                Ok(LocalStore {
                    conn: SharedConnection::new(conn),
                })
            }
            Ok(Err(err)) => {
                error!("event=local_store_init module=offline status=error error={err}");
                Err(StorageError::Db(err))
            }
            Err(err) => {
                error!("event=local_store_init module=offline status=error error={err}");
                Err(StorageError::Init(err.to_string()))
            }
        }
    }
}
