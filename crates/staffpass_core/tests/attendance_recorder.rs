use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime};
use staffpass_core::db::{open_db_in_memory, Schema, SharedConnection};
use staffpass_core::model::attendance::RecordId;
use staffpass_core::repo::attendance_repo::RecordStoreResult;
use staffpass_core::{
    AttendanceRecord, AttendanceRecorder, AttendanceStatus, AttendanceStore, AttendanceWarning,
    CoreConfig, ManualClock, RecordOutcome, RecordQuery, SqliteAttendanceStore, Subject,
    WorkSchedule,
};
use std::sync::Arc;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
}

fn at(hms: &str) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        DateTime::parse_from_rfc3339(&format!("2026-10-12T{hms}-03:00")).unwrap(),
    ))
}

fn subject(id: &str, unit_id: &str) -> Subject {
    Subject {
        id: id.to_string(),
        display_name: format!("Staff {id}"),
        matricula: format!("M-{id}"),
        unit_id: unit_id.to_string(),
    }
}

fn config(tolerance_minutes: u32) -> CoreConfig {
    CoreConfig {
        reading_unit_id: "unit-a".to_string(),
        operator_id: "reader-1".to_string(),
        entry_tolerance_minutes: tolerance_minutes,
        ..CoreConfig::default()
    }
}

fn store() -> Arc<SqliteAttendanceStore> {
    let conn = SharedConnection::new(open_db_in_memory(Schema::Authority).unwrap());
    Arc::new(SqliteAttendanceStore::new(conn))
}

fn schedule(subject_id: &str, entry: Option<(u32, u32)>, is_day_off: bool) -> WorkSchedule {
    WorkSchedule {
        subject_id: subject_id.to_string(),
        unit_id: "unit-a".to_string(),
        week_start: monday(),
        day_of_week: 1,
        entry_time: entry.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
        exit_time: Some(NaiveTime::from_hms_opt(17, 0, 0).unwrap()),
        is_day_off,
    }
}

async fn records_of(store: &SqliteAttendanceStore, subject_id: &str) -> Vec<AttendanceRecord> {
    store
        .query_records(&RecordQuery::subject_on(subject_id, monday()))
        .await
        .unwrap()
}

#[tokio::test]
async fn three_scans_walk_entry_exit_and_completed() {
    let store = store();
    store.upsert_schedule(&schedule("s-1", Some((8, 0)), false)).unwrap();
    let clock = at("07:55:00");
    let recorder = AttendanceRecorder::new(store.clone(), clock.clone(), &config(0));
    let ana = subject("s-1", "unit-a");

    let first = recorder.record(&ana).await.unwrap();
    let RecordOutcome::CheckedIn(record) = &first else {
        panic!("expected check-in, got {first:?}");
    };
    assert_eq!(record.status, AttendanceStatus::Present);
    assert_eq!(record.recorded_by, "reader-1");
    assert!(record.check_in_time.is_some());
    assert!(record.check_out_time.is_none());

    clock.advance(ChronoDuration::hours(9));
    let second = recorder.record(&ana).await.unwrap();
    let RecordOutcome::CheckedOut(record) = &second else {
        panic!("expected check-out, got {second:?}");
    };
    assert_eq!(record.status, AttendanceStatus::Present);
    assert_eq!(record.check_out_time, NaiveTime::from_hms_opt(16, 55, 0));

    let stored_after_exit = records_of(&store, "s-1").await;

    clock.advance(ChronoDuration::minutes(5));
    let third = recorder.record(&ana).await.unwrap();
    assert_eq!(
        third,
        RecordOutcome::Warning(AttendanceWarning::AlreadyCompleted)
    );
    assert_eq!(records_of(&store, "s-1").await, stored_after_exit);
    assert_eq!(stored_after_exit.len(), 1);
}

#[tokio::test]
async fn lateness_is_strictly_after_entry_time() {
    let store = store();
    store.upsert_schedule(&schedule("late", Some((8, 0)), false)).unwrap();
    store.upsert_schedule(&schedule("early", Some((8, 0)), false)).unwrap();

    let late = AttendanceRecorder::new(store.clone(), at("08:00:01"), &config(0));
    let outcome = late.record(&subject("late", "unit-a")).await.unwrap();
    assert!(matches!(
        outcome,
        RecordOutcome::CheckedIn(AttendanceRecord { status: AttendanceStatus::Late, .. })
    ));

    let early = AttendanceRecorder::new(store.clone(), at("07:59:59"), &config(0));
    let outcome = early.record(&subject("early", "unit-a")).await.unwrap();
    assert!(matches!(
        outcome,
        RecordOutcome::CheckedIn(AttendanceRecord { status: AttendanceStatus::Present, .. })
    ));
}

#[tokio::test]
async fn sub_second_past_entry_is_late_and_stored_in_whole_seconds() {
    let store = store();
    store.upsert_schedule(&schedule("s-1", Some((8, 0)), false)).unwrap();

    let recorder = AttendanceRecorder::new(store.clone(), at("08:00:00.500"), &config(0));
    let outcome = recorder.record(&subject("s-1", "unit-a")).await.unwrap();
    match outcome {
        RecordOutcome::CheckedIn(record) => {
            assert_eq!(record.status, AttendanceStatus::Late);
            assert_eq!(
                record.check_in_time,
                Some(NaiveTime::from_hms_opt(8, 0, 0).unwrap())
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(records_of(&store, "s-1").await[0].status, AttendanceStatus::Late);
}

#[tokio::test]
async fn exit_after_clock_step_back_is_clamped_to_entry() {
    let store = store();
    let ana = subject("s-1", "unit-a");
    AttendanceRecorder::new(store.clone(), at("09:00:00"), &config(0))
        .record(&ana)
        .await
        .unwrap();

    let stepped_back = AttendanceRecorder::new(store.clone(), at("08:59:30"), &config(0));
    let outcome = stepped_back.record(&ana).await.unwrap();
    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    match outcome {
        RecordOutcome::CheckedOut(record) => assert_eq!(record.check_out_time, Some(nine)),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let stored = records_of(&store, "s-1").await;
    assert_eq!(stored[0].check_out_time, Some(nine));
    assert_eq!(
        stepped_back.record(&ana).await.unwrap(),
        RecordOutcome::Warning(AttendanceWarning::AlreadyCompleted)
    );
}

#[tokio::test]
async fn tolerance_extends_entry_deadline() {
    let store = store();
    store.upsert_schedule(&schedule("s-1", Some((8, 0)), false)).unwrap();
    store.upsert_schedule(&schedule("s-2", Some((8, 0)), false)).unwrap();

    let within = AttendanceRecorder::new(store.clone(), at("08:05:00"), &config(5));
    let outcome = within.record(&subject("s-1", "unit-a")).await.unwrap();
    assert!(matches!(
        outcome,
        RecordOutcome::CheckedIn(AttendanceRecord { status: AttendanceStatus::Present, .. })
    ));

    let past = AttendanceRecorder::new(store.clone(), at("08:05:01"), &config(5));
    let outcome = past.record(&subject("s-2", "unit-a")).await.unwrap();
    assert!(matches!(
        outcome,
        RecordOutcome::CheckedIn(AttendanceRecord { status: AttendanceStatus::Late, .. })
    ));
}

#[tokio::test]
async fn day_off_writes_nothing() {
    let store = store();
    store.upsert_schedule(&schedule("s-1", None, true)).unwrap();
    let recorder = AttendanceRecorder::new(store.clone(), at("09:00:00"), &config(0));

    let outcome = recorder.record(&subject("s-1", "unit-a")).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Warning(AttendanceWarning::DayOff));
    assert!(records_of(&store, "s-1").await.is_empty());
}

#[tokio::test]
async fn subject_from_another_unit_is_not_recorded() {
    let store = store();
    let recorder = AttendanceRecorder::new(store.clone(), at("09:00:00"), &config(0));

    let outcome = recorder.record(&subject("s-1", "unit-b")).await.unwrap();
    assert_eq!(
        outcome,
        RecordOutcome::Warning(AttendanceWarning::UnitMismatch {
            home_unit: "unit-b".to_string(),
            reading_unit: "unit-a".to_string(),
        })
    );
    assert!(records_of(&store, "s-1").await.is_empty());
}

#[tokio::test]
async fn missing_schedule_records_present() {
    let store = store();
    let recorder = AttendanceRecorder::new(store.clone(), at("11:30:00"), &config(0));

    let outcome = recorder.record(&subject("s-1", "unit-a")).await.unwrap();
    assert!(matches!(
        outcome,
        RecordOutcome::CheckedIn(AttendanceRecord { status: AttendanceStatus::Present, .. })
    ));
}

#[tokio::test]
async fn outcome_message_names_subject_and_time() {
    let store = store();
    store.upsert_schedule(&schedule("s-1", Some((8, 0)), false)).unwrap();
    let recorder = AttendanceRecorder::new(store, at("08:10:00"), &config(0));
    let ana = subject("s-1", "unit-a");

    let outcome = recorder.record(&ana).await.unwrap();
    assert_eq!(
        outcome.message(&ana),
        "Entry recorded for Staff s-1 at 08:10:00 (late)"
    );
}

/// Store whose reads never see today's record, as if another reader inserted
/// it between lookup and insert.
struct RacingStore {
    inner: Arc<SqliteAttendanceStore>,
}

#[async_trait]
impl AttendanceStore for RacingStore {
    async fn query_records(&self, _query: &RecordQuery) -> RecordStoreResult<Vec<AttendanceRecord>> {
        Ok(Vec::new())
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()> {
        self.inner.insert_record(record).await
    }

    async fn update_record(&self, record: &AttendanceRecord) -> RecordStoreResult<()> {
        self.inner.update_record(record).await
    }

    async fn delete_record(&self, id: RecordId) -> RecordStoreResult<()> {
        self.inner.delete_record(id).await
    }

    async fn check_out(&self, id: RecordId, check_out_time: NaiveTime) -> RecordStoreResult<bool> {
        self.inner.check_out(id, check_out_time).await
    }

    async fn find_schedule(
        &self,
        subject_id: &str,
        week_start: NaiveDate,
        day_of_week: u8,
    ) -> RecordStoreResult<Option<WorkSchedule>> {
        self.inner
            .find_schedule(subject_id, week_start, day_of_week)
            .await
    }
}

#[tokio::test]
async fn lost_insert_race_is_reported_without_second_record() {
    let inner = store();
    let other_reader = AttendanceRecorder::new(inner.clone(), at("08:00:00"), &config(0));
    other_reader.record(&subject("s-1", "unit-a")).await.unwrap();

    let racing = Arc::new(RacingStore {
        inner: inner.clone(),
    });
    let recorder = AttendanceRecorder::new(racing, at("08:00:00"), &config(0));
    let outcome = recorder.record(&subject("s-1", "unit-a")).await.unwrap();

    assert_eq!(
        outcome,
        RecordOutcome::Warning(AttendanceWarning::ConcurrentCheckIn)
    );
    assert_eq!(records_of(&inner, "s-1").await.len(), 1);
}
