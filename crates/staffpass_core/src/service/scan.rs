//! Reader-side scan gate.
//!
//! # Responsibility
//! - Turn a stream of decoded strings into at most one validation attempt per
//!   unique code per cooldown window.
//! - Resolve each attempt into a display state and a recent-activity line.
//!
//! # Invariants
//! - Single-flight: the busy flag is claimed synchronously before any await;
//!   events arriving while it is held are dropped, not queued.
//! - The flag is released by `ScanPermit`'s drop, whatever the outcome.
//! - Text shaped like a signed token is only ever checked by the authority.
//! - Validation and recording failures end in a display state; they are never
//!   returned to the capture loop.

use crate::clock::Clock;
use crate::logging::scan_digest;
use crate::model::token::{CredentialTrust, LegacyPayload, Subject};
use crate::service::activity::{ActivityEntry, ActivityLevel, RecentActivity};
use crate::service::recorder::{AttendanceRecorder, RecordOutcome, RecorderError};
use crate::token::{
    LegacyVerifier, ParsedCredential, TokenAuthority, TokenError, TokenResult, TokenRotation,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Reader display state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Processing,
    Success(String),
    Warning(String),
    Error(String),
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Warning(_) | Self::Error(_))
    }
}

/// Final result of one admitted scan.
#[derive(Debug)]
pub enum ScanOutcome {
    Recorded {
        subject: Subject,
        trust: CredentialTrust,
        outcome: RecordOutcome,
    },
    Rejected(TokenError),
    Failed(RecorderError),
}

/// Invoked after a scan consumed a subject's code and wrote a record.
#[async_trait]
pub trait ScanHook: Send + Sync {
    async fn on_recorded(&self, subject: &Subject);
}

/// Re-issues the displayed code once it has been used.
#[async_trait]
impl ScanHook for TokenRotation {
    async fn on_recorded(&self, subject: &Subject) {
        if subject.id == self.subject_id() {
            self.refresh_now();
        }
    }
}

#[derive(Debug)]
struct LastScan {
    raw: String,
    finished_at: Option<Instant>,
}

pub struct ScanProcessor {
    authority: Arc<dyn TokenAuthority>,
    legacy: LegacyVerifier,
    recorder: AttendanceRecorder,
    activity: Arc<RecentActivity>,
    clock: Arc<dyn Clock>,
    hook: Option<Arc<dyn ScanHook>>,
    cooldown: Duration,
    busy: AtomicBool,
    last_scan: Mutex<Option<LastScan>>,
    state: watch::Sender<ScanState>,
}

/// Exclusive right to process one scan; releases the busy flag on drop.
pub struct ScanPermit {
    processor: Arc<ScanProcessor>,
    raw: String,
}

impl ScanPermit {
    /// Runs validation and recording for the admitted string.
    pub async fn process(self) -> ScanOutcome {
        self.processor.process(&self.raw).await
    }
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        {
            let mut last_scan = self
                .processor
                .last_scan
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(last) = last_scan.as_mut() {
                if last.raw == self.raw {
                    last.finished_at = Some(Instant::now());
                }
            }
        }
        self.processor.busy.store(false, Ordering::Release);
    }
}

impl ScanProcessor {
    pub fn new(
        authority: Arc<dyn TokenAuthority>,
        legacy: LegacyVerifier,
        recorder: AttendanceRecorder,
        activity: Arc<RecentActivity>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            authority,
            legacy,
            recorder,
            activity,
            clock,
            hook: None,
            cooldown,
            busy: AtomicBool::new(false),
            last_scan: Mutex::new(None),
            state,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ScanHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn activity(&self) -> &RecentActivity {
        &self.activity
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Synchronous admission filter.
    ///
    /// Returns `None` for empty decodes, while another scan is in flight, and
    /// for a repeat of the last string within the cooldown window.
    pub fn try_begin(self: &Arc<Self>, raw: &str) -> Option<ScanPermit> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                "event=scan_admit module=service status=skip reason=busy frame={}",
                scan_digest(raw)
            );
            return None;
        }

        let mut last_scan = self
            .last_scan
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cooling_down = last_scan.as_ref().is_some_and(|last| {
            last.raw == raw
                && last
                    .finished_at
                    .map_or(true, |finished| finished.elapsed() < self.cooldown)
        });
        if cooling_down {
            drop(last_scan);
            self.busy.store(false, Ordering::Release);
            debug!(
                "event=scan_admit module=service status=skip reason=cooldown frame={}",
                scan_digest(raw)
            );
            return None;
        }
        debug!(
            "event=scan_admit module=service status=ok frame={}",
            scan_digest(raw)
        );

        *last_scan = Some(LastScan {
            raw: raw.to_string(),
            finished_at: None,
        });
        Some(ScanPermit {
            processor: Arc::clone(self),
            raw: raw.to_string(),
        })
    }

    /// Admits and processes one decoded string in place.
    pub async fn handle_decoded(self: &Arc<Self>, raw: &str) -> Option<ScanOutcome> {
        let permit = self.try_begin(raw)?;
        Some(permit.process().await)
    }

    /// Consumes decoded-text events until the sender side closes.
    ///
    /// Admitted scans run on their own task; the loop keeps draining the
    /// stream so events arriving meanwhile are dropped by the admission
    /// filter. In-flight work completes before this returns.
    pub async fn run(self: Arc<Self>, mut decoded: mpsc::Receiver<String>) {
        info!("event=scan_reader module=service status=start");
        let mut in_flight: Option<JoinHandle<()>> = None;

        while let Some(raw) = decoded.recv().await {
            let Some(permit) = self.try_begin(&raw) else {
                continue;
            };
            let processor = Arc::clone(&self);
            in_flight = Some(tokio::spawn(async move {
                permit.process().await;
                let settle = Arc::clone(&processor);
                tokio::spawn(async move {
                    tokio::time::sleep(settle.cooldown).await;
                    settle.settle();
                });
            }));
        }

        if let Some(task) = in_flight {
            if let Err(err) = task.await {
                warn!("event=scan_reader module=service status=error error={err}");
            }
        }
        self.reset();
        info!("event=scan_reader module=service status=stop");
    }

    /// Clears the cooldown memory and returns the display to idle.
    pub fn reset(&self) {
        *self
            .last_scan
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.state.send_replace(ScanState::Idle);
    }

    /// Returns a finished display state to idle when no scan is in flight.
    fn settle(&self) {
        self.state.send_if_modified(|state| {
            if state.is_terminal() && !self.is_busy() {
                *state = ScanState::Idle;
                true
            } else {
                false
            }
        });
    }

    async fn process(&self, raw: &str) -> ScanOutcome {
        self.state.send_replace(ScanState::Processing);

        let outcome = match self.verify(raw).await {
            Ok((subject, trust)) => match self.recorder.record(&subject).await {
                Ok(outcome) => ScanOutcome::Recorded {
                    subject,
                    trust,
                    outcome,
                },
                Err(err) => ScanOutcome::Failed(err),
            },
            Err(err) => ScanOutcome::Rejected(err),
        };

        if let ScanOutcome::Recorded {
            subject,
            outcome: RecordOutcome::CheckedIn(_) | RecordOutcome::CheckedOut(_),
            ..
        } = &outcome
        {
            if let Some(hook) = &self.hook {
                hook.on_recorded(subject).await;
            }
        }

        self.publish(&outcome);
        outcome
    }

    async fn verify(&self, raw: &str) -> TokenResult<(Subject, CredentialTrust)> {
        match ParsedCredential::parse(raw) {
            ParsedCredential::Signed(text) => {
                // dotted text is never base64, so a legacy retry cannot succeed
                let subject = self.authority.validate(&text).await.into_result()?;
                Ok((subject, CredentialTrust::Verified))
            }
            ParsedCredential::Legacy(payload) => self.verify_legacy(&payload).await,
            ParsedCredential::Unrecognized => {
                Err(TokenError::Malformed("unrecognized credential".to_string()))
            }
        }
    }

    async fn verify_legacy(
        &self,
        payload: &LegacyPayload,
    ) -> TokenResult<(Subject, CredentialTrust)> {
        let subject = self.legacy.verify(payload).await?;
        Ok((subject, CredentialTrust::Legacy))
    }

    fn publish(&self, outcome: &ScanOutcome) {
        let (level, subject_id, message) = match outcome {
            ScanOutcome::Recorded {
                subject, outcome, ..
            } => {
                let level = match outcome {
                    RecordOutcome::Warning(_) => ActivityLevel::Warning,
                    _ => ActivityLevel::Success,
                };
                (level, Some(subject.id.clone()), outcome.message(subject))
            }
            ScanOutcome::Rejected(err) => (ActivityLevel::Error, None, rejection_message(err)),
            ScanOutcome::Failed(_) => (
                ActivityLevel::Error,
                None,
                "Attendance could not be recorded, try again".to_string(),
            ),
        };

        let state = match level {
            ActivityLevel::Success => ScanState::Success(message.clone()),
            ActivityLevel::Warning => ScanState::Warning(message.clone()),
            ActivityLevel::Error => ScanState::Error(message.clone()),
        };
        self.state.send_replace(state);
        self.activity.push(ActivityEntry {
            at: self.clock.now(),
            level,
            subject_id,
            message,
        });
    }
}

fn rejection_message(err: &TokenError) -> String {
    match err {
        TokenError::Expired => "Code expired, ask for a new one".to_string(),
        TokenError::Malformed(_) => "Code invalid or corrupted".to_string(),
        TokenError::AlreadyUsed => "Code already used".to_string(),
        TokenError::SubjectNotFound(_) => "Staff member not found".to_string(),
        TokenError::Unavailable(_) | TokenError::Signing(_) => {
            "Validation unavailable, try again".to_string()
        }
    }
}
