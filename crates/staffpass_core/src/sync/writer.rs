//! Mutate-or-enqueue front door for local changes.

use crate::model::offline::{ActionId, ActionKind};
use crate::offline::{PendingActionQueue, StorageResult};
use crate::sync::connectivity::Connectivity;
use crate::sync::remote::{apply_action, RemoteTable};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The remote store accepted the mutation.
    Applied,
    /// The mutation was queued for a later sync pass.
    Queued(ActionId),
}

/// Writes through to the remote store when possible, otherwise queues.
#[derive(Clone)]
pub struct OfflineWriter {
    remote: Arc<dyn RemoteTable>,
    queue: PendingActionQueue,
    connectivity: watch::Receiver<Connectivity>,
}

impl OfflineWriter {
    pub fn new(
        remote: Arc<dyn RemoteTable>,
        queue: PendingActionQueue,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        Self {
            remote,
            queue,
            connectivity,
        }
    }

    /// Only local queue failures surface as errors.
    pub async fn submit(&self, kind: ActionKind, table: &str, payload: &Value) -> StorageResult<WriteOutcome> {
        let online = self.connectivity.borrow().online;
        if online {
            match apply_action(self.remote.as_ref(), kind, table, payload).await {
                Ok(()) => {
                    info!(
                        "event=offline_write module=sync status=ok mode=direct kind={} table={table}",
                        kind.as_str()
                    );
                    return Ok(WriteOutcome::Applied);
                }
                Err(err) => {
                    warn!(
                        "event=offline_write module=sync status=error mode=direct kind={} table={table} error={err}",
                        kind.as_str()
                    );
                }
            }
        }

        let id = self.queue.enqueue(kind, table, payload).await?;
        Ok(WriteOutcome::Queued(id))
    }
}
