//! Attendance record and work schedule models.
//!
//! # Responsibility
//! - Define the daily attendance session record and its status.
//! - Define the read-only schedule input consulted by the recorder.
//! - Provide ISO week helpers used for schedule lookup.
//!
//! # Invariants
//! - `check_out_time` is only set when `check_in_time` is set.
//! - `week_start` is always a Monday; `day_of_week` is 1 (Mon) ..= 7 (Sun).

use crate::model::token::{SubjectId, UnitId};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an attendance record.
pub type RecordId = Uuid;

/// Attendance outcome for one subject on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Checked in on time.
    Present,
    /// Checked in after the scheduled entry time.
    Late,
    /// No check-in (set by administrative flows).
    Absent,
    /// Absence covered by an approved justification.
    Justified,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
            Self::Justified => "justified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            "justified" => Some(Self::Justified),
            _ => None,
        }
    }
}

/// Record validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceValidationError {
    CheckOutWithoutCheckIn,
    CheckOutBeforeCheckIn,
    EmptySubject,
}

impl Display for AttendanceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckOutWithoutCheckIn => write!(f, "check_out_time requires check_in_time"),
            Self::CheckOutBeforeCheckIn => {
                write!(f, "check_out_time must not be earlier than check_in_time")
            }
            Self::EmptySubject => write!(f, "subject_id cannot be empty"),
        }
    }
}

impl Error for AttendanceValidationError {}

/// One daily attendance session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub subject_id: SubjectId,
    /// Unit where the check-in was read.
    pub unit_id: UnitId,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
    /// Operator or device that recorded the entry.
    pub recorded_by: String,
}

impl AttendanceRecord {
    /// Creates an open session checked in at `check_in_time`.
    pub fn check_in(
        subject_id: impl Into<SubjectId>,
        unit_id: impl Into<UnitId>,
        date: NaiveDate,
        check_in_time: NaiveTime,
        status: AttendanceStatus,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            unit_id: unit_id.into(),
            date,
            check_in_time: Some(check_in_time),
            check_out_time: None,
            status,
            recorded_by: recorded_by.into(),
        }
    }

    /// Returns whether the session has a check-in and no check-out yet.
    pub fn is_open(&self) -> bool {
        self.check_in_time.is_some() && self.check_out_time.is_none()
    }

    pub fn validate(&self) -> Result<(), AttendanceValidationError> {
        if self.subject_id.trim().is_empty() {
            return Err(AttendanceValidationError::EmptySubject);
        }
        match (self.check_in_time, self.check_out_time) {
            (None, Some(_)) => Err(AttendanceValidationError::CheckOutWithoutCheckIn),
            (Some(check_in), Some(check_out)) if check_out < check_in => {
                Err(AttendanceValidationError::CheckOutBeforeCheckIn)
            }
            _ => Ok(()),
        }
    }
}

/// Scheduled working hours for one subject on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub subject_id: SubjectId,
    pub unit_id: UnitId,
    /// Monday of the ISO week.
    pub week_start: NaiveDate,
    /// ISO weekday, 1 = Monday.
    pub day_of_week: u8,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    pub is_day_off: bool,
}

/// Returns the Monday of the ISO week containing `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Returns the ISO weekday number of `date` (1 = Monday ..= 7 = Sunday).
pub fn iso_day_of_week(date: NaiveDate) -> u8 {
    // number_from_monday is always within 1..=7
    date.weekday().number_from_monday() as u8
}
