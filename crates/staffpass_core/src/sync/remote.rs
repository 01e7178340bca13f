//! Remote store seams used by the offline pipeline.

use crate::model::offline::ActionKind;
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote side answered and refused the mutation.
    Rejected(String),
    /// The remote side could not be reached.
    Unreachable(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "remote rejected: {reason}"),
            Self::Unreachable(reason) => write!(f, "remote unreachable: {reason}"),
        }
    }
}

impl Error for RemoteError {}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Mutations against named tables of the remote store.
///
/// `delete` payloads carry at least the entity id.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn create(&self, table: &str, payload: &Value) -> RemoteResult<()>;
    async fn update(&self, table: &str, payload: &Value) -> RemoteResult<()>;
    async fn delete(&self, table: &str, payload: &Value) -> RemoteResult<()>;
}

/// Reads of single entities from the remote store.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// Returns `Ok(None)` when the remote store has no such entity.
    async fn fetch(&self, table: &str, key: &str) -> RemoteResult<Option<Value>>;
}

/// Sends one queued mutation to the matching remote operation.
pub(crate) async fn apply_action(
    remote: &dyn RemoteTable,
    kind: ActionKind,
    table: &str,
    payload: &Value,
) -> RemoteResult<()> {
    match kind {
        ActionKind::Create => remote.create(table, payload).await,
        ActionKind::Update => remote.update(table, payload).await,
        ActionKind::Delete => remote.delete(table, payload).await,
    }
}
