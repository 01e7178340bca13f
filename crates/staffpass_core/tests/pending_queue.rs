use serde_json::json;
use staffpass_core::{ActionKind, LocalStoreHandle, PendingActionQueue, SystemClock};
use std::sync::Arc;
use uuid::Uuid;

fn queue() -> PendingActionQueue {
    PendingActionQueue::new(Arc::new(LocalStoreHandle::in_memory()), Arc::new(SystemClock))
}

#[tokio::test]
async fn list_preserves_insertion_order_without_dedup() {
    let queue = queue();
    let first = queue
        .enqueue(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();
    let second = queue
        .enqueue(ActionKind::Update, "units", &json!({"id": "u-1"}))
        .await
        .unwrap();
    let third = queue
        .enqueue(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();

    let ids: Vec<Uuid> = queue.list().await.unwrap().iter().map(|action| action.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert_eq!(queue.count().await.unwrap(), 3);

    let staff = queue.list_for_table("staff").await.unwrap();
    assert_eq!(staff.len(), 2);
    assert_eq!(staff[0].kind, ActionKind::Create);
    assert_eq!(staff[0].payload, json!({"id": "a"}));
}

#[tokio::test]
async fn remove_is_a_noop_for_unknown_ids() {
    let queue = queue();
    let id = queue
        .enqueue(ActionKind::Delete, "staff", &json!({"id": "a"}))
        .await
        .unwrap();

    assert!(!queue.remove(Uuid::new_v4()).await.unwrap());
    assert_eq!(queue.count().await.unwrap(), 1);

    assert!(queue.remove(id).await.unwrap());
    assert!(!queue.remove(id).await.unwrap());
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn queued_actions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.db");

    let id = PendingActionQueue::new(Arc::new(LocalStoreHandle::file(&path)), Arc::new(SystemClock))
        .enqueue(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();

    let reopened =
        PendingActionQueue::new(Arc::new(LocalStoreHandle::file(&path)), Arc::new(SystemClock));
    let actions = reopened.list().await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, id);
    assert_eq!(actions[0].table, "staff");
}
