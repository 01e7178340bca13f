//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations per database role in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one schema.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

/// Database role. Each role owns an independent migration chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Reader-side durable store: cached entities, pending actions, session.
    Local,
    /// Record store and token authority: subjects, schedules, records, nonces.
    Authority,
}

impl Schema {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Authority => "authority",
        }
    }

    fn migrations(self) -> &'static [Migration] {
        match self {
            Self::Local => LOCAL_MIGRATIONS,
            Self::Authority => AUTHORITY_MIGRATIONS,
        }
    }
}

const LOCAL_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("local/0001_init.sql"),
}];

const AUTHORITY_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("authority/0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("authority/0002_nonce_ledger.sql"),
    },
];

/// Returns the latest migration version known by this binary for `schema`.
pub fn latest_version(schema: Schema) -> u32 {
    schema
        .migrations()
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations of `schema` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version(schema);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in schema.migrations() {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
