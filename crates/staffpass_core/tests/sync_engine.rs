use async_trait::async_trait;
use serde_json::{json, Value};
use staffpass_core::sync::RemoteResult;
use staffpass_core::{
    ActionKind, ConnectivityMonitor, CoreConfig, LocalStoreHandle, OfflineWriter,
    PendingActionQueue, RemoteError, RemoteTable, SyncEngine, SyncOutcome, SyncReport,
    SystemClock, WriteOutcome,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};

#[derive(Default)]
struct FakeRemote {
    failing: AtomicBool,
    calls: Mutex<Vec<(&'static str, String, Value)>>,
}

impl FakeRemote {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, kind: &'static str, table: &str, payload: &Value) -> RemoteResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((kind, table.to_string(), payload.clone()));
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Unreachable("timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTable for FakeRemote {
    async fn create(&self, table: &str, payload: &Value) -> RemoteResult<()> {
        self.record("create", table, payload)
    }
    async fn update(&self, table: &str, payload: &Value) -> RemoteResult<()> {
        self.record("update", table, payload)
    }
    async fn delete(&self, table: &str, payload: &Value) -> RemoteResult<()> {
        self.record("delete", table, payload)
    }
}

struct Pipeline {
    monitor: ConnectivityMonitor,
    remote: Arc<FakeRemote>,
    queue: PendingActionQueue,
    writer: OfflineWriter,
    engine: Arc<SyncEngine>,
}

fn pipeline(online: bool) -> Pipeline {
    let monitor = ConnectivityMonitor::new(online);
    let remote = Arc::new(FakeRemote::default());
    let queue = PendingActionQueue::new(
        Arc::new(LocalStoreHandle::in_memory()),
        Arc::new(SystemClock),
    );
    let writer = OfflineWriter::new(remote.clone(), queue.clone(), monitor.subscribe());
    let engine = Arc::new(SyncEngine::new(
        "staff",
        remote.clone(),
        queue.clone(),
        monitor.subscribe(),
        &CoreConfig::default(),
    ));
    Pipeline {
        monitor,
        remote,
        queue,
        writer,
        engine,
    }
}

#[tokio::test(start_paused = true)]
async fn offline_write_is_queued_and_drained_after_reconnect() {
    let p = pipeline(false);

    let outcome = p
        .writer
        .submit(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();
    assert!(matches!(outcome, WriteOutcome::Queued(_)));
    assert_eq!(p.queue.list().await.unwrap().len(), 1);

    assert!(matches!(p.engine.trigger().await, SyncOutcome::Offline));
    assert_eq!(p.remote.call_count(), 0);

    p.monitor.set_online(true);
    let report = p.engine.trigger().await.report().unwrap();
    assert_eq!(
        report,
        SyncReport {
            attempted: 1,
            succeeded: 1,
            failed: 0
        }
    );
    assert_eq!(p.queue.count().await.unwrap(), 0);
    assert_eq!(p.engine.last_report(), Some(report));
}

#[tokio::test(start_paused = true)]
async fn failed_action_stays_queued_and_is_retried_next_pass() {
    let p = pipeline(true);
    p.queue
        .enqueue(ActionKind::Update, "staff", &json!({"id": "a"}))
        .await
        .unwrap();
    p.remote.failing.store(true, Ordering::SeqCst);

    let report = p.engine.trigger().await.report().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(p.queue.count().await.unwrap(), 1);
    assert_eq!(p.remote.call_count(), 1);

    p.remote.failing.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(5)).await;
    let report = p.engine.trigger().await.report().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(p.queue.count().await.unwrap(), 0);
    assert_eq!(p.remote.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn engine_only_drains_its_own_table() {
    let p = pipeline(true);
    p.queue
        .enqueue(ActionKind::Create, "units", &json!({"id": "u-1"}))
        .await
        .unwrap();
    p.queue
        .enqueue(ActionKind::Delete, "staff", &json!({"id": "a"}))
        .await
        .unwrap();

    let report = p.engine.trigger().await.report().unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(p.queue.list_for_table("units").await.unwrap().len(), 1);
    assert_eq!(p.remote.calls.lock().unwrap()[0].0, "delete");
}

#[tokio::test(start_paused = true)]
async fn trigger_inside_debounce_window_is_suppressed() {
    let p = pipeline(true);

    assert!(p.engine.trigger().await.report().is_some());
    tokio::time::advance(Duration::from_millis(4_999)).await;
    assert!(matches!(p.engine.trigger().await, SyncOutcome::Debounced));
    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(p.engine.trigger().await.report().is_some());
}

/// Remote that parks every call until released.
struct GatedRemote {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RemoteTable for GatedRemote {
    async fn create(&self, _table: &str, _payload: &Value) -> RemoteResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
    async fn update(&self, table: &str, payload: &Value) -> RemoteResult<()> {
        self.create(table, payload).await
    }
    async fn delete(&self, table: &str, payload: &Value) -> RemoteResult<()> {
        self.create(table, payload).await
    }
}

#[tokio::test]
async fn overlapping_trigger_is_dropped_while_pass_runs() {
    let monitor = ConnectivityMonitor::new(true);
    let remote = Arc::new(GatedRemote {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let queue = PendingActionQueue::new(
        Arc::new(LocalStoreHandle::in_memory()),
        Arc::new(SystemClock),
    );
    queue
        .enqueue(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();
    let engine = Arc::new(SyncEngine::new(
        "staff",
        remote.clone(),
        queue.clone(),
        monitor.subscribe(),
        &CoreConfig::default(),
    ));

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.trigger().await })
    };
    remote.entered.notified().await;
    assert!(engine.is_running());
    assert!(matches!(engine.trigger().await, SyncOutcome::Busy));

    remote.release.notify_one();
    let report = running.await.unwrap().report().unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(!engine.is_running());
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn run_loop_drains_on_reconnect_and_stops_on_shutdown() {
    let p = pipeline(false);
    p.queue
        .enqueue(ActionKind::Create, "staff", &json!({"id": "a"}))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(p.engine.clone().run(shutdown_rx));

    tokio::task::yield_now().await;
    assert_eq!(p.remote.call_count(), 0);

    p.monitor.set_online(true);
    tokio::time::timeout(Duration::from_secs(5), async {
        while p.queue.count().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(p.remote.call_count(), 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn run_loop_drains_on_recurring_tick_while_online() {
    let p = pipeline(true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(p.engine.clone().run(shutdown_rx));

    // the first tick fires at once and finds nothing to send
    while p.engine.last_report().is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(p.engine.last_report().unwrap().attempted, 0);

    p.queue
        .enqueue(ActionKind::Update, "staff", &json!({"id": "a"}))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    tokio::task::yield_now().await;
    assert_eq!(p.remote.call_count(), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    while p.engine.last_report().unwrap().attempted == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(p.engine.last_report().unwrap().succeeded, 1);
    assert_eq!(p.remote.call_count(), 1);
    assert_eq!(p.queue.count().await.unwrap(), 0);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}
