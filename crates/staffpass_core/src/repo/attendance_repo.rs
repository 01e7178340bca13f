//! Attendance record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide range query, insert, update-by-id and delete-by-id over
//!   attendance records.
//! - Provide read-only schedule lookup and subject directory lookup.
//!
//! # Invariants
//! - Inserting a second record for the same `(subject_id, date)` fails with
//!   `RecordStoreError::Conflict` instead of creating a duplicate.
//! - `check_out` only mutates an open session and never stores an exit
//!   earlier than the entry (conditional update).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::{DbError, SharedConnection};
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceValidationError, RecordId, WorkSchedule,
};
use crate::model::token::{Subject, SubjectId, UnitId};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    subject_id,
    unit_id,
    date,
    check_in_time,
    check_out_time,
    status,
    recorded_by
FROM attendance_records";

pub type RecordStoreResult<T> = Result<T, RecordStoreError>;

/// Record store failure.
#[derive(Debug)]
pub enum RecordStoreError {
    Validation(AttendanceValidationError),
    Db(DbError),
    NotFound(RecordId),
    /// A record for this subject and day already exists.
    Conflict { subject_id: SubjectId, date: NaiveDate },
    InvalidData(String),
}

impl Display for RecordStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "attendance record not found: {id}"),
            Self::Conflict { subject_id, date } => write!(
                f,
                "attendance record already exists for subject {subject_id} on {date}"
            ),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted attendance data: {message}")
            }
        }
    }
}

impl Error for RecordStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AttendanceValidationError> for RecordStoreError {
    fn from(value: AttendanceValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RecordStoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RecordStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Range query over attendance records. `None` filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub subject_id: Option<SubjectId>,
    pub unit_id: Option<UnitId>,
    /// Inclusive lower bound.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub date_to: Option<NaiveDate>,
}

impl RecordQuery {
    /// Query matching one subject on one day.
    pub fn subject_on(subject_id: impl Into<SubjectId>, date: NaiveDate) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            unit_id: None,
            date_from: Some(date),
            date_to: Some(date),
        }
    }
}

/// Staff directory lookup.
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn find_subject(&self, subject_id: &str) -> RecordStoreResult<Option<Subject>>;
}

/// Attendance record store consumed by the recorder.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn query_records(&self, query: &RecordQuery) -> RecordStoreResult<Vec<AttendanceRecord>>;

    /// Inserts a new record; fails with `Conflict` when the day is taken.
    async fn insert_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()>;

    async fn update_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()>;

    async fn delete_record(&self, id: RecordId) -> RecordStoreResult<()>;

    /// Sets `check_out_time` on an open session.
    ///
    /// Returns `false` when the session was already closed or the exit would
    /// precede the entry.
    async fn check_out(&self, id: RecordId, check_out_time: NaiveTime) -> RecordStoreResult<bool>;

    async fn find_schedule(
        &self,
        subject_id: &str,
        week_start: NaiveDate,
        day_of_week: u8,
    ) -> RecordStoreResult<Option<WorkSchedule>>;

    async fn find_record(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> RecordStoreResult<Option<AttendanceRecord>> {
        let mut records = self
            .query_records(&RecordQuery::subject_on(subject_id, date))
            .await?;
        Ok(records.pop())
    }
}

/// SQLite-backed record store and staff directory.
#[derive(Clone)]
pub struct SqliteAttendanceStore {
    conn: SharedConnection,
}

impl SqliteAttendanceStore {
    /// Wraps a connection migrated with `Schema::Authority`.
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces one directory entry.
    pub fn upsert_subject(&self, subject: &Subject) -> RecordStoreResult<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO subjects (id, display_name, matricula, unit_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    display_name = excluded.display_name,
                    matricula = excluded.matricula,
                    unit_id = excluded.unit_id;",
                params![
                    subject.id.as_str(),
                    subject.display_name.as_str(),
                    subject.matricula.as_str(),
                    subject.unit_id.as_str(),
                ],
            )
        })?;
        Ok(())
    }

    /// Inserts or replaces one schedule day.
    pub fn upsert_schedule(&self, schedule: &WorkSchedule) -> RecordStoreResult<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO work_schedules (
                    subject_id, unit_id, week_start, day_of_week,
                    entry_time, exit_time, is_day_off
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(subject_id, week_start, day_of_week) DO UPDATE SET
                    unit_id = excluded.unit_id,
                    entry_time = excluded.entry_time,
                    exit_time = excluded.exit_time,
                    is_day_off = excluded.is_day_off;",
                params![
                    schedule.subject_id.as_str(),
                    schedule.unit_id.as_str(),
                    format_date(schedule.week_start),
                    i64::from(schedule.day_of_week),
                    schedule.entry_time.map(format_time),
                    schedule.exit_time.map(format_time),
                    i64::from(schedule.is_day_off),
                ],
            )
        })?;
        Ok(())
    }
}

#[async_trait]
impl SubjectDirectory for SqliteAttendanceStore {
    async fn find_subject(&self, subject_id: &str) -> RecordStoreResult<Option<Subject>> {
        let subject = self.conn.with(|conn| {
            conn.query_row(
                "SELECT id, display_name, matricula, unit_id FROM subjects WHERE id = ?1;",
                [subject_id],
                |row| {
                    Ok(Subject {
                        id: row.get("id")?,
                        display_name: row.get("display_name")?,
                        matricula: row.get("matricula")?,
                        unit_id: row.get("unit_id")?,
                    })
                },
            )
            .optional()
        })?;
        Ok(subject)
    }
}

#[async_trait]
impl AttendanceStore for SqliteAttendanceStore {
    async fn query_records(&self, query: &RecordQuery) -> RecordStoreResult<Vec<AttendanceRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(subject_id) = &query.subject_id {
            sql.push_str(" AND subject_id = ?");
            bind_values.push(Value::Text(subject_id.clone()));
        }
        if let Some(unit_id) = &query.unit_id {
            sql.push_str(" AND unit_id = ?");
            bind_values.push(Value::Text(unit_id.clone()));
        }
        if let Some(date_from) = query.date_from {
            sql.push_str(" AND date >= ?");
            bind_values.push(Value::Text(format_date(date_from)));
        }
        if let Some(date_to) = query.date_to {
            sql.push_str(" AND date <= ?");
            bind_values.push(Value::Text(format_date(date_to)));
        }
        sql.push_str(" ORDER BY date ASC, subject_id ASC");

        self.conn.with(|conn| -> RecordStoreResult<Vec<AttendanceRecord>> {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(parse_record_row(row)?);
            }
            Ok(records)
        })
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()> {
        record.validate()?;

        let result = self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO attendance_records (
                    id, subject_id, unit_id, date,
                    check_in_time, check_out_time, status, recorded_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    record.id.to_string(),
                    record.subject_id.as_str(),
                    record.unit_id.as_str(),
                    format_date(record.date),
                    record.check_in_time.map(format_time),
                    record.check_out_time.map(format_time),
                    record.status.as_str(),
                    record.recorded_by.as_str(),
                ],
            )
        });

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = DbError::from(err);
                if err.is_constraint_violation() {
                    return Err(RecordStoreError::Conflict {
                        subject_id: record.subject_id.clone(),
                        date: record.date,
                    });
                }
                Err(err.into())
            }
        }
    }

    async fn update_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()> {
        record.validate()?;

        let changed = self.conn.with(|conn| {
            conn.execute(
                "UPDATE attendance_records
                 SET
                    unit_id = ?1,
                    check_in_time = ?2,
                    check_out_time = ?3,
                    status = ?4,
                    recorded_by = ?5
                 WHERE id = ?6;",
                params![
                    record.unit_id.as_str(),
                    record.check_in_time.map(format_time),
                    record.check_out_time.map(format_time),
                    record.status.as_str(),
                    record.recorded_by.as_str(),
                    record.id.to_string(),
                ],
            )
        })?;

        if changed == 0 {
            return Err(RecordStoreError::NotFound(record.id));
        }
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> RecordStoreResult<()> {
        let changed = self.conn.with(|conn| {
            conn.execute(
                "DELETE FROM attendance_records WHERE id = ?1;",
                [id.to_string()],
            )
        })?;

        if changed == 0 {
            return Err(RecordStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn check_out(&self, id: RecordId, check_out_time: NaiveTime) -> RecordStoreResult<bool> {
        self.conn.with(|conn| -> RecordStoreResult<bool> {
            let changed = conn.execute(
                "UPDATE attendance_records
                 SET check_out_time = ?1
                 WHERE id = ?2
                   AND check_in_time IS NOT NULL
                   AND check_in_time <= ?1
                   AND check_out_time IS NULL;",
                params![format_time(check_out_time), id.to_string()],
            )?;
            if changed > 0 {
                return Ok(true);
            }

            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM attendance_records WHERE id = ?1);",
                [id.to_string()],
                |row| row.get(0),
            )?;
            if exists {
                Ok(false)
            } else {
                Err(RecordStoreError::NotFound(id))
            }
        })
    }

    async fn find_schedule(
        &self,
        subject_id: &str,
        week_start: NaiveDate,
        day_of_week: u8,
    ) -> RecordStoreResult<Option<WorkSchedule>> {
        self.conn.with(|conn| -> RecordStoreResult<Option<WorkSchedule>> {
            let mut stmt = conn.prepare(
                "SELECT
                    subject_id, unit_id, week_start, day_of_week,
                    entry_time, exit_time, is_day_off
                 FROM work_schedules
                 WHERE subject_id = ?1 AND week_start = ?2 AND day_of_week = ?3;",
            )?;
            let mut rows = stmt.query(params![
                subject_id,
                format_date(week_start),
                i64::from(day_of_week)
            ])?;
            match rows.next()? {
                Some(row) => Ok(Some(parse_schedule_row(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn parse_record_row(row: &Row<'_>) -> RecordStoreResult<AttendanceRecord> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RecordStoreError::InvalidData(format!(
            "invalid uuid value `{id_text}` in attendance_records.id"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::parse(&status_text).ok_or_else(|| {
        RecordStoreError::InvalidData(format!(
            "invalid status `{status_text}` in attendance_records.status"
        ))
    })?;

    let record = AttendanceRecord {
        id,
        subject_id: row.get("subject_id")?,
        unit_id: row.get("unit_id")?,
        date: parse_date(&row.get::<_, String>("date")?, "attendance_records.date")?,
        check_in_time: parse_optional_time(
            row.get("check_in_time")?,
            "attendance_records.check_in_time",
        )?,
        check_out_time: parse_optional_time(
            row.get("check_out_time")?,
            "attendance_records.check_out_time",
        )?,
        status,
        recorded_by: row.get("recorded_by")?,
    };
    record.validate()?;
    Ok(record)
}

fn parse_schedule_row(row: &Row<'_>) -> RecordStoreResult<WorkSchedule> {
    let day_of_week = match row.get::<_, i64>("day_of_week")? {
        value @ 1..=7 => value as u8,
        other => {
            return Err(RecordStoreError::InvalidData(format!(
                "invalid day_of_week `{other}` in work_schedules.day_of_week"
            )));
        }
    };
    let is_day_off = match row.get::<_, i64>("is_day_off")? {
        0 => false,
        1 => true,
        other => {
            return Err(RecordStoreError::InvalidData(format!(
                "invalid is_day_off value `{other}` in work_schedules.is_day_off"
            )));
        }
    };

    Ok(WorkSchedule {
        subject_id: row.get("subject_id")?,
        unit_id: row.get("unit_id")?,
        week_start: parse_date(
            &row.get::<_, String>("week_start")?,
            "work_schedules.week_start",
        )?,
        day_of_week,
        entry_time: parse_optional_time(row.get("entry_time")?, "work_schedules.entry_time")?,
        exit_time: parse_optional_time(row.get("exit_time")?, "work_schedules.exit_time")?,
        is_day_off,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_date(value: &str, column: &str) -> RecordStoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        RecordStoreError::InvalidData(format!("invalid date `{value}` in {column}"))
    })
}

fn parse_optional_time(value: Option<String>, column: &str) -> RecordStoreResult<Option<NaiveTime>> {
    match value {
        Some(text) => NaiveTime::parse_from_str(&text, TIME_FORMAT)
            .map(Some)
            .map_err(|_| RecordStoreError::InvalidData(format!("invalid time `{text}` in {column}"))),
        None => Ok(None),
    }
}
