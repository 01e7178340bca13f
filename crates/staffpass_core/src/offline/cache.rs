//! Offline entity cache.
//!
//! # Responsibility
//! - Keep the last fetched copy of remote entities, keyed by table and key.
//! - Serve cached copies when the remote store cannot be reached.
//!
//! # Invariants
//! - `put` overwrites; there is at most one entry per `(table, key)`.
//! - `clear(Some(table))` only touches rows of that table.

use crate::clock::Clock;
use crate::model::offline::CachedEntity;
use crate::offline::store::LocalStoreHandle;
use crate::offline::{ensure_table, StorageError, StorageResult};
use crate::sync::remote::{EntityFetcher, RemoteError};
use log::{debug, info, warn};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of a fetch-through read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    /// Fetched from the remote store and written to the cache.
    Fresh(Value),
    /// Remote fetch failed; last cached copy returned.
    Stale {
        entity: CachedEntity,
        error: RemoteError,
    },
    /// Remote store has no such entity; any cached copy was dropped.
    NotFound,
    /// Remote fetch failed and nothing was cached.
    Unavailable(RemoteError),
}

/// Cache of previously fetched entities.
#[derive(Clone)]
pub struct OfflineCache {
    handle: Arc<LocalStoreHandle>,
    clock: Arc<dyn Clock>,
}

impl OfflineCache {
    pub fn new(handle: Arc<LocalStoreHandle>, clock: Arc<dyn Clock>) -> Self {
        Self { handle, clock }
    }

    /// Stores `value` under `(table, key)`, replacing any previous copy.
    pub async fn put(&self, table: &str, key: &str, value: &Value) -> StorageResult<()> {
        ensure_table(table)?;
        let payload = serde_json::to_string(value)?;
        let cached_at = self.clock.now_millis();
        let store = self.handle.store().await?;

        store.conn().with(|conn| {
            conn.execute(
                "INSERT INTO cached_entities (table_name, entity_key, payload, cached_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(table_name, entity_key) DO UPDATE SET
                    payload = excluded.payload,
                    cached_at = excluded.cached_at;",
                params![table, key, payload, cached_at],
            )
        })?;
        debug!("event=cache_put module=offline status=ok table={table}");
        Ok(())
    }

    /// Serializes and stores a typed value.
    pub async fn put_as<T: Serialize>(&self, table: &str, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        self.put(table, key, &value).await
    }

    pub async fn get(&self, table: &str, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.get_entry(table, key).await?.map(|entity| entity.payload))
    }

    /// Reads and deserializes a typed value.
    pub async fn get_as<T: DeserializeOwned>(&self, table: &str, key: &str) -> StorageResult<Option<T>> {
        match self.get(table, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Reads one entry including its cache timestamp.
    pub async fn get_entry(&self, table: &str, key: &str) -> StorageResult<Option<CachedEntity>> {
        ensure_table(table)?;
        let store = self.handle.store().await?;

        let row = store.conn().with(|conn| {
            conn.query_row(
                "SELECT payload, cached_at FROM cached_entities
                 WHERE table_name = ?1 AND entity_key = ?2;",
                params![table, key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
        })?;

        match row {
            Some((payload, cached_at)) => Ok(Some(CachedEntity {
                table: table.to_string(),
                key: key.to_string(),
                payload: parse_payload(&payload, table)?,
                cached_at,
            })),
            None => Ok(None),
        }
    }

    /// Lists all cached values of `table`, ordered by key.
    pub async fn list(&self, table: &str) -> StorageResult<Vec<Value>> {
        ensure_table(table)?;
        let store = self.handle.store().await?;

        let payloads = store.conn().with(|conn| -> StorageResult<Vec<String>> {
            let mut stmt = conn.prepare(
                "SELECT payload FROM cached_entities
                 WHERE table_name = ?1
                 ORDER BY entity_key ASC;",
            )?;
            let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
            let mut payloads = Vec::new();
            for row in rows {
                payloads.push(row?);
            }
            Ok(payloads)
        })?;

        payloads
            .iter()
            .map(|payload| parse_payload(payload, table))
            .collect()
    }

    /// Removes cached entries: all of them, or only those of `table`.
    ///
    /// Returns the number of removed entries.
    pub async fn clear(&self, table: Option<&str>) -> StorageResult<usize> {
        if let Some(table) = table {
            ensure_table(table)?;
        }
        let store = self.handle.store().await?;

        let removed = store.conn().with(|conn| match table {
            Some(table) => conn.execute("DELETE FROM cached_entities WHERE table_name = ?1;", [table]),
            None => conn.execute("DELETE FROM cached_entities;", []),
        })?;
        info!(
            "event=cache_clear module=offline status=ok scope={} removed={removed}",
            table.unwrap_or("all")
        );
        Ok(removed)
    }

    /// Removes one entry. Returns whether it existed.
    pub async fn invalidate(&self, table: &str, key: &str) -> StorageResult<bool> {
        ensure_table(table)?;
        let store = self.handle.store().await?;
        let removed = store.conn().with(|conn| {
            conn.execute(
                "DELETE FROM cached_entities WHERE table_name = ?1 AND entity_key = ?2;",
                params![table, key],
            )
        })?;
        Ok(removed > 0)
    }

    /// Fetches from the remote store, falling back to the cached copy.
    ///
    /// Local storage failures are returned as errors; remote failures are
    /// reported through [`CacheRead`].
    pub async fn get_or_fetch(
        &self,
        table: &str,
        key: &str,
        fetcher: &dyn EntityFetcher,
    ) -> StorageResult<CacheRead> {
        ensure_table(table)?;
        match fetcher.fetch(table, key).await {
            Ok(Some(value)) => {
                self.put(table, key, &value).await?;
                Ok(CacheRead::Fresh(value))
            }
            Ok(None) => {
                self.invalidate(table, key).await?;
                Ok(CacheRead::NotFound)
            }
            Err(error) => match self.get_entry(table, key).await? {
                Some(entity) => {
                    warn!(
                        "event=cache_fetch module=offline status=stale table={table} cached_at={} error={error}",
                        entity.cached_at
                    );
                    Ok(CacheRead::Stale { entity, error })
                }
                None => {
                    warn!("event=cache_fetch module=offline status=error table={table} error={error}");
                    Ok(CacheRead::Unavailable(error))
                }
            },
        }
    }
}

fn parse_payload(payload: &str, table: &str) -> StorageResult<Value> {
    serde_json::from_str(payload).map_err(|_| {
        StorageError::InvalidData(format!("invalid cached payload json in table `{table}`"))
    })
}
