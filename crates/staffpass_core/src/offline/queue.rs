//! Durable queue of not-yet-confirmed mutations.
//!
//! # Responsibility
//! - Persist create/update/delete actions until the remote store accepts them.
//! - Preserve insertion order for replay.
//!
//! # Invariants
//! - Actions are removed only by explicit `remove` after remote confirmation.
//! - No deduplication; callers avoid enqueuing redundant mutations.

use crate::clock::Clock;
use crate::model::offline::{ActionId, ActionKind, PendingAction};
use crate::offline::store::LocalStoreHandle;
use crate::offline::{ensure_table, StorageError, StorageResult};
use log::info;
use rusqlite::{params, Row};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const ACTION_SELECT_SQL: &str = "SELECT id, kind, table_name, payload, enqueued_at
FROM pending_actions";

#[derive(Clone)]
pub struct PendingActionQueue {
    handle: Arc<LocalStoreHandle>,
    clock: Arc<dyn Clock>,
}

impl PendingActionQueue {
    pub fn new(handle: Arc<LocalStoreHandle>, clock: Arc<dyn Clock>) -> Self {
        Self { handle, clock }
    }

    /// Appends an action and returns its id.
    pub async fn enqueue(&self, kind: ActionKind, table: &str, payload: &Value) -> StorageResult<ActionId> {
        ensure_table(table)?;
        let id = Uuid::new_v4();
        let payload_text = serde_json::to_string(payload)?;
        let enqueued_at = self.clock.now_millis();
        let store = self.handle.store().await?;

        store.conn().with(|conn| {
            conn.execute(
                "INSERT INTO pending_actions (id, kind, table_name, payload, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![id.to_string(), kind.as_str(), table, payload_text, enqueued_at],
            )
        })?;
        info!(
            "event=queue_enqueue module=offline status=ok action_id={id} kind={} table={table}",
            kind.as_str()
        );
        Ok(id)
    }

    /// All pending actions in insertion order.
    pub async fn list(&self) -> StorageResult<Vec<PendingAction>> {
        self.select(None).await
    }

    /// Pending actions of one table in insertion order.
    pub async fn list_for_table(&self, table: &str) -> StorageResult<Vec<PendingAction>> {
        ensure_table(table)?;
        self.select(Some(table)).await
    }

    /// Removes one action. Unknown ids are a no-op returning `false`.
    pub async fn remove(&self, id: ActionId) -> StorageResult<bool> {
        let store = self.handle.store().await?;
        let removed = store.conn().with(|conn| {
            conn.execute("DELETE FROM pending_actions WHERE id = ?1;", [id.to_string()])
        })?;
        Ok(removed > 0)
    }

    pub async fn count(&self) -> StorageResult<usize> {
        let store = self.handle.store().await?;
        let count = store.conn().with(|conn| {
            conn.query_row("SELECT COUNT(*) FROM pending_actions;", [], |row| {
                row.get::<_, i64>(0)
            })
        })?;
        usize::try_from(count)
            .map_err(|_| StorageError::InvalidData(format!("invalid pending action count {count}")))
    }

    async fn select(&self, table: Option<&str>) -> StorageResult<Vec<PendingAction>> {
        let store = self.handle.store().await?;
        store.conn().with(|conn| -> StorageResult<Vec<PendingAction>> {
            let (sql, bind) = match table {
                Some(table) => (
                    format!("{ACTION_SELECT_SQL} WHERE table_name = ?1 ORDER BY seq ASC"),
                    Some(table),
                ),
                None => (format!("{ACTION_SELECT_SQL} ORDER BY seq ASC"), None),
            };
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = match bind {
                Some(table) => stmt.query([table])?,
                None => stmt.query([])?,
            };
            let mut actions = Vec::new();
            while let Some(row) = rows.next()? {
                actions.push(parse_action_row(row)?);
            }
            Ok(actions)
        })
    }
}

fn parse_action_row(row: &Row<'_>) -> StorageResult<PendingAction> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StorageError::InvalidData(format!("invalid uuid value `{id_text}` in pending_actions.id"))
    })?;

    let kind_text: String = row.get("kind")?;
    let kind = ActionKind::parse(&kind_text).ok_or_else(|| {
        StorageError::InvalidData(format!("invalid kind `{kind_text}` in pending_actions.kind"))
    })?;

    let payload_text: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload_text).map_err(|_| {
        StorageError::InvalidData(format!("invalid payload json for pending action {id}"))
    })?;

    Ok(PendingAction {
        id,
        kind,
        table: row.get("table_name")?,
        payload,
        enqueued_at: row.get("enqueued_at")?,
    })
}
