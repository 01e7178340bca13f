//! Queue drain engine bound to one remote table.
//!
//! # Responsibility
//! - Replay pending actions of its table against the remote store.
//! - Fire on offline-to-online transitions and on a recurring timer.
//!
//! # Invariants
//! - Overlapping runs are suppressed, never queued.
//! - A run starting less than the debounce window after the previous run's
//!   start is suppressed.
//! - A failed action stays queued and is retried on a later pass only.

use crate::config::CoreConfig;
use crate::offline::{PendingActionQueue, StorageError};
use crate::sync::connectivity::Connectivity;
use crate::sync::remote::{apply_action, RemoteTable};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Aggregate counts of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of one trigger.
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Skipped: the device is offline.
    Offline,
    /// Skipped: the previous run started within the debounce window.
    Debounced,
    /// Skipped: a run is already in flight.
    Busy,
    /// The pass was aborted by a local queue failure.
    Aborted(StorageError),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<SyncReport> {
        match self {
            Self::Completed(report) => Some(*report),
            _ => None,
        }
    }
}

pub struct SyncEngine {
    table: String,
    remote: Arc<dyn RemoteTable>,
    queue: PendingActionQueue,
    connectivity: watch::Receiver<Connectivity>,
    interval: Duration,
    debounce: Duration,
    running: AtomicBool,
    last_start: Mutex<Option<Instant>>,
    last_report: Mutex<Option<SyncReport>>,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    pub fn new(
        table: impl Into<String>,
        remote: Arc<dyn RemoteTable>,
        queue: PendingActionQueue,
        connectivity: watch::Receiver<Connectivity>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            table: table.into(),
            remote,
            queue,
            connectivity,
            interval: config.sync_interval(),
            debounce: config.sync_debounce(),
            running: AtomicBool::new(false),
            last_start: Mutex::new(None),
            last_report: Mutex::new(None),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Report of the most recent completed pass.
    pub fn last_report(&self) -> Option<SyncReport> {
        *self
            .last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs one drain pass unless a guard suppresses it.
    pub async fn trigger(&self) -> SyncOutcome {
        if !self.connectivity.borrow().online {
            info!(
                "event=sync_run module=sync status=skip reason=offline table={}",
                self.table
            );
            return SyncOutcome::Offline;
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!(
                "event=sync_run module=sync status=skip reason=busy table={}",
                self.table
            );
            return SyncOutcome::Busy;
        }
        let _guard = RunGuard(&self.running);

        {
            let mut last_start = self
                .last_start
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            if let Some(previous) = *last_start {
                if now.duration_since(previous) < self.debounce {
                    info!(
                        "event=sync_run module=sync status=skip reason=debounce table={}",
                        self.table
                    );
                    return SyncOutcome::Debounced;
                }
            }
            *last_start = Some(now);
        }

        info!("event=sync_run module=sync status=start table={}", self.table);
        match self.drain().await {
            Ok(report) => {
                info!(
                    "event=sync_run module=sync status=ok table={} attempted={} succeeded={} failed={}",
                    self.table, report.attempted, report.succeeded, report.failed
                );
                *self
                    .last_report
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
                SyncOutcome::Completed(report)
            }
            Err(err) => {
                error!(
                    "event=sync_run module=sync status=error table={} error={err}",
                    self.table
                );
                SyncOutcome::Aborted(err)
            }
        }
    }

    async fn drain(&self) -> Result<SyncReport, StorageError> {
        let actions = self.queue.list_for_table(&self.table).await?;
        let mut report = SyncReport {
            attempted: actions.len(),
            ..SyncReport::default()
        };

        for action in actions {
            match apply_action(self.remote.as_ref(), action.kind, &action.table, &action.payload)
                .await
            {
                Ok(()) => {
                    self.queue.remove(action.id).await?;
                    report.succeeded += 1;
                }
                Err(err) => {
                    warn!(
                        "event=sync_action module=sync status=error table={} action_id={} kind={} error={err}",
                        self.table,
                        action.id,
                        action.kind.as_str()
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Long-lived loop: triggers on reconnection and on the recurring timer
    /// while online. Returns when `shutdown` turns true or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut connectivity = self.connectivity.clone();
        let mut online = connectivity.borrow_and_update().online;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("event=sync_loop module=sync status=start table={}", self.table);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        warn!("event=sync_loop module=sync status=error reason=connectivity_closed table={}", self.table);
                        break;
                    }
                    let now_online = connectivity.borrow_and_update().online;
                    let reconnected = now_online && !online;
                    online = now_online;
                    if reconnected {
                        self.trigger().await;
                    }
                }
                _ = ticker.tick() => {
                    if online {
                        self.trigger().await;
                    }
                }
            }
        }
        info!("event=sync_loop module=sync status=stop table={}", self.table);
    }
}
