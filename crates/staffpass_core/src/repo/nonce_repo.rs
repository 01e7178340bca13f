//! Single-use nonce ledger.
//!
//! # Responsibility
//! - Record token nonces the first time they are presented.
//! - Report replays of already consumed nonces.
//!
//! # Invariants
//! - `consume` is one conditional insert; two concurrent presentations of the
//!   same nonce can never both observe `Consumed`.
//! - Entries are kept at least until their token expiry.

use crate::db::{DbError, DbResult, SharedConnection};
use async_trait::async_trait;
use log::debug;
use rusqlite::params;

/// Result of presenting a nonce to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First presentation; the nonce is now marked consumed.
    Consumed,
    /// The nonce was consumed before.
    AlreadyConsumed,
}

#[async_trait]
pub trait NonceLedger: Send + Sync {
    async fn consume(
        &self,
        nonce: &str,
        subject_id: &str,
        consumed_at_ms: i64,
        expires_at_ms: i64,
    ) -> DbResult<ConsumeOutcome>;

    async fn is_consumed(&self, nonce: &str) -> DbResult<bool>;

    /// Drops entries whose token expired before `now_ms`. Returns rows removed.
    async fn purge_expired(&self, now_ms: i64) -> DbResult<usize>;
}

/// SQLite-backed nonce ledger sharing the authority connection.
#[derive(Clone)]
pub struct SqliteNonceLedger {
    conn: SharedConnection,
}

impl SqliteNonceLedger {
    /// Wraps a connection migrated with `Schema::Authority`.
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl NonceLedger for SqliteNonceLedger {
    async fn consume(
        &self,
        nonce: &str,
        subject_id: &str,
        consumed_at_ms: i64,
        expires_at_ms: i64,
    ) -> DbResult<ConsumeOutcome> {
        let result = self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO consumed_nonces (nonce, subject_id, consumed_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![nonce, subject_id, consumed_at_ms, expires_at_ms],
            )
        });

        match result {
            Ok(_) => Ok(ConsumeOutcome::Consumed),
            Err(err) => {
                let err = DbError::from(err);
                if err.is_constraint_violation() {
                    debug!("event=nonce_consume module=repo status=replay subject_id={subject_id}");
                    return Ok(ConsumeOutcome::AlreadyConsumed);
                }
                Err(err)
            }
        }
    }

    async fn is_consumed(&self, nonce: &str) -> DbResult<bool> {
        let exists = self.conn.with(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM consumed_nonces WHERE nonce = ?1);",
                [nonce],
                |row| row.get::<_, bool>(0),
            )
        })?;
        Ok(exists)
    }

    async fn purge_expired(&self, now_ms: i64) -> DbResult<usize> {
        let removed = self.conn.with(|conn| {
            conn.execute(
                "DELETE FROM consumed_nonces WHERE expires_at < ?1;",
                [now_ms],
            )
        })?;
        Ok(removed)
    }
}
