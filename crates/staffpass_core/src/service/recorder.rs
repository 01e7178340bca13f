//! Attendance decision logic.
//!
//! # Responsibility
//! - Decide between check-in, check-out and warning for a resolved subject.
//! - Persist the decision through the record store.
//!
//! # Invariants
//! - At most one record per subject and day; a lost insert race is reported
//!   as `ConcurrentCheckIn` and nothing else is written.
//! - A completed session is never mutated again.
//! - Unit mismatch and day-off write nothing.

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::model::attendance::{
    iso_day_of_week, iso_week_start, AttendanceRecord, AttendanceStatus, WorkSchedule,
};
use crate::model::token::{Subject, UnitId};
use crate::repo::attendance_repo::{AttendanceStore, RecordStoreError};
use chrono::{Duration, NaiveTime, Timelike};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RecorderResult<T> = Result<T, RecorderError>;

#[derive(Debug)]
pub enum RecorderError {
    Store(RecordStoreError),
}

impl Display for RecorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "attendance store failed: {err}"),
        }
    }
}

impl Error for RecorderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RecordStoreError> for RecorderError {
    fn from(value: RecordStoreError) -> Self {
        Self::Store(value)
    }
}

/// Non-fatal outcomes that leave the store untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceWarning {
    UnitMismatch { home_unit: UnitId, reading_unit: UnitId },
    DayOff,
    /// Today's session already has a check-out.
    AlreadyCompleted,
    /// Another reader created today's record first.
    ConcurrentCheckIn,
}

impl AttendanceWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnitMismatch { .. } => "unit_mismatch",
            Self::DayOff => "day_off",
            Self::AlreadyCompleted => "already_completed",
            Self::ConcurrentCheckIn => "concurrent_check_in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    CheckedIn(AttendanceRecord),
    /// Exit event; status of the record is unchanged.
    CheckedOut(AttendanceRecord),
    Warning(AttendanceWarning),
}

impl RecordOutcome {
    /// Human-readable line for the reader display.
    pub fn message(&self, subject: &Subject) -> String {
        let name = &subject.display_name;
        match self {
            Self::CheckedIn(record) => {
                let at = format_clock(record.check_in_time);
                match record.status {
                    AttendanceStatus::Late => format!("Entry recorded for {name} at {at} (late)"),
                    _ => format!("Entry recorded for {name} at {at}"),
                }
            }
            Self::CheckedOut(record) => format!(
                "Exit recorded for {name} at {}",
                format_clock(record.check_out_time)
            ),
            Self::Warning(AttendanceWarning::UnitMismatch { home_unit, .. }) => {
                format!("{name} belongs to unit {home_unit}, not this unit")
            }
            Self::Warning(AttendanceWarning::DayOff) => format!("{name} has a day off today"),
            Self::Warning(AttendanceWarning::AlreadyCompleted) => {
                format!("{name} already completed entry and exit today")
            }
            Self::Warning(AttendanceWarning::ConcurrentCheckIn) => {
                format!("Entry for {name} was recorded by another reader")
            }
        }
    }
}

fn format_clock(time: Option<NaiveTime>) -> String {
    time.map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Applies the daily attendance state machine for one reading unit.
pub struct AttendanceRecorder {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    reading_unit_id: UnitId,
    operator_id: String,
    tolerance: Duration,
}

impl AttendanceRecorder {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: Arc<dyn Clock>, config: &CoreConfig) -> Self {
        Self {
            store,
            clock,
            reading_unit_id: config.reading_unit_id.clone(),
            operator_id: config.operator_id.clone(),
            tolerance: Duration::minutes(i64::from(config.entry_tolerance_minutes)),
        }
    }

    pub fn reading_unit_id(&self) -> &str {
        &self.reading_unit_id
    }

    /// Records an entry or exit for `subject` at the current local time.
    pub async fn record(&self, subject: &Subject) -> RecorderResult<RecordOutcome> {
        if subject.unit_id != self.reading_unit_id {
            warn!(
                "event=attendance_record module=service status=skip reason=unit_mismatch subject_id={}",
                subject.id
            );
            return Ok(RecordOutcome::Warning(AttendanceWarning::UnitMismatch {
                home_unit: subject.unit_id.clone(),
                reading_unit: self.reading_unit_id.clone(),
            }));
        }

        let now = self.clock.now();
        let today = now.date_naive();
        let time = now.time();

        let schedule = self
            .store
            .find_schedule(&subject.id, iso_week_start(today), iso_day_of_week(today))
            .await
            .map_err(|err| self.log_store_error(subject, err))?;
        if schedule.as_ref().is_some_and(|schedule| schedule.is_day_off) {
            info!(
                "event=attendance_record module=service status=skip reason=day_off subject_id={}",
                subject.id
            );
            return Ok(RecordOutcome::Warning(AttendanceWarning::DayOff));
        }

        let existing = self
            .store
            .find_record(&subject.id, today)
            .await
            .map_err(|err| self.log_store_error(subject, err))?;

        match existing {
            None => self.check_in(subject, today, time, schedule.as_ref()).await,
            Some(record) if record.is_open() => self.check_out(subject, record, time).await,
            Some(_) => {
                info!(
                    "event=attendance_record module=service status=skip reason=already_completed subject_id={}",
                    subject.id
                );
                Ok(RecordOutcome::Warning(AttendanceWarning::AlreadyCompleted))
            }
        }
    }

    async fn check_in(
        &self,
        subject: &Subject,
        today: chrono::NaiveDate,
        time: NaiveTime,
        schedule: Option<&WorkSchedule>,
    ) -> RecorderResult<RecordOutcome> {
        let status = match schedule.and_then(|schedule| schedule.entry_time) {
            Some(entry_time) if self.is_late(time, entry_time) => AttendanceStatus::Late,
            _ => AttendanceStatus::Present,
        };
        let record = AttendanceRecord::check_in(
            subject.id.clone(),
            self.reading_unit_id.clone(),
            today,
            whole_seconds(time),
            status,
            self.operator_id.clone(),
        );

        match self.store.insert_record(&record).await {
            Ok(()) => {
                info!(
                    "event=attendance_record module=service status=ok action=check_in subject_id={} attendance_status={}",
                    subject.id,
                    status.as_str()
                );
                Ok(RecordOutcome::CheckedIn(record))
            }
            Err(RecordStoreError::Conflict { .. }) => {
                warn!(
                    "event=attendance_record module=service status=skip reason=concurrent_check_in subject_id={}",
                    subject.id
                );
                Ok(RecordOutcome::Warning(AttendanceWarning::ConcurrentCheckIn))
            }
            Err(err) => Err(self.log_store_error(subject, err)),
        }
    }

    async fn check_out(
        &self,
        subject: &Subject,
        mut record: AttendanceRecord,
        time: NaiveTime,
    ) -> RecorderResult<RecordOutcome> {
        // a wall clock stepped back must not produce an exit before the entry
        let time = record
            .check_in_time
            .map_or(whole_seconds(time), |check_in| whole_seconds(time).max(check_in));
        let closed = self
            .store
            .check_out(record.id, time)
            .await
            .map_err(|err| self.log_store_error(subject, err))?;
        if !closed {
            info!(
                "event=attendance_record module=service status=skip reason=already_completed subject_id={}",
                subject.id
            );
            return Ok(RecordOutcome::Warning(AttendanceWarning::AlreadyCompleted));
        }

        record.check_out_time = Some(time);
        info!(
            "event=attendance_record module=service status=ok action=check_out subject_id={}",
            subject.id
        );
        Ok(RecordOutcome::CheckedOut(record))
    }

    /// Strictly after the scheduled entry plus tolerance.
    fn is_late(&self, time: NaiveTime, entry_time: NaiveTime) -> bool {
        let (deadline, wrapped_secs) = entry_time.overflowing_add_signed(self.tolerance);
        wrapped_secs == 0 && time > deadline
    }

    fn log_store_error(&self, subject: &Subject, err: RecordStoreError) -> RecorderError {
        error!(
            "event=attendance_record module=service status=error subject_id={} error={err}",
            subject.id
        );
        RecorderError::Store(err)
    }
}

/// Stored times carry whole seconds; lateness is decided before truncation.
fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}
