//! Offline cache and pending-mutation models.
//!
//! # Responsibility
//! - Define cached entity and pending action shapes persisted locally.
//! - Validate logical table names shared with the remote store.
//!
//! # Invariants
//! - Table names match `[a-z][a-z0-9_]*` and are at most 64 chars.
//! - `enqueued_at`/`cached_at` are Unix epoch milliseconds.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid table name regex"));

const MAX_TABLE_NAME_CHARS: usize = 64;

/// Stable identifier of a queued mutation.
pub type ActionId = Uuid;

/// Mutation kind replayed against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Mutation not yet confirmed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub table: String,
    pub payload: Value,
    pub enqueued_at: i64,
}

/// Last successfully fetched copy of a remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity {
    pub table: String,
    pub key: String,
    pub payload: Value,
    pub cached_at: i64,
}

/// Returns whether `table` is an acceptable logical table name.
pub fn is_valid_table_name(table: &str) -> bool {
    table.len() <= MAX_TABLE_NAME_CHARS && TABLE_NAME_RE.is_match(table)
}
