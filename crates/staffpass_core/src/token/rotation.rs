//! Periodic re-issue of the displayed token.
//!
//! # Invariants
//! - A new token is issued every rotation interval regardless of outcome.
//! - `refresh_now` issues immediately and restarts the interval.
//! - `stop` clears the timer; no token is issued afterwards.

use crate::token::issuer::{IssuedToken, TokenIssuer};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Keeps the current token of one subject fresh.
pub struct TokenRotation {
    subject_id: String,
    current: watch::Receiver<Option<IssuedToken>>,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl TokenRotation {
    /// Spawns the rotation task on the current tokio runtime.
    pub fn start(issuer: Arc<TokenIssuer>, subject_id: impl Into<String>, every: Duration) -> Self {
        let subject_id = subject_id.into();
        let (sender, current) = watch::channel(None);
        let refresh = Arc::new(Notify::new());

        let task_subject = subject_id.clone();
        let task_refresh = Arc::clone(&refresh);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = task_refresh.notified() => {
                        interval.reset();
                    }
                }

                match issuer.issue(&task_subject) {
                    Ok(issued) => {
                        if sender.send(Some(issued)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!(
                            "event=token_rotate module=token status=error subject_id={task_subject} error={err}"
                        );
                    }
                }
            }
        });

        info!("event=token_rotation module=token status=start subject_id={subject_id}");
        Self {
            subject_id,
            current,
            refresh,
            task,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Latest issued token, if any has been issued yet.
    pub fn current(&self) -> Option<IssuedToken> {
        self.current.borrow().clone()
    }

    /// Receiver that observes every re-issue.
    pub fn subscribe(&self) -> watch::Receiver<Option<IssuedToken>> {
        self.current.clone()
    }

    /// Issues a replacement token now, e.g. after a successful check-in.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Stops rotating.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            info!(
                "event=token_rotation module=token status=stop subject_id={}",
                self.subject_id
            );
        }
    }
}

impl Drop for TokenRotation {
    fn drop(&mut self) {
        self.task.abort();
    }
}
