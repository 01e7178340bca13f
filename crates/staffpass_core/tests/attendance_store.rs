use chrono::{NaiveDate, NaiveTime};
use staffpass_core::db::{open_db_in_memory, Schema, SharedConnection};
use staffpass_core::{
    AttendanceRecord, AttendanceStatus, AttendanceStore, RecordQuery, RecordStoreError,
    SqliteAttendanceStore,
};
use uuid::Uuid;

fn store() -> SqliteAttendanceStore {
    SqliteAttendanceStore::new(SharedConnection::new(
        open_db_in_memory(Schema::Authority).unwrap(),
    ))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn entry(subject_id: &str, unit_id: &str, date: NaiveDate) -> AttendanceRecord {
    AttendanceRecord::check_in(
        subject_id,
        unit_id,
        date,
        hm(8, 0),
        AttendanceStatus::Present,
        "reader-1",
    )
}

#[tokio::test]
async fn update_by_id_replaces_mutable_fields() {
    let store = store();
    let mut record = entry("s-1", "unit-a", day(12));
    store.insert_record(&record).await.unwrap();

    record.check_out_time = Some(hm(17, 0));
    record.status = AttendanceStatus::Late;
    record.recorded_by = "supervisor".to_string();
    store.update_record(&record).await.unwrap();

    let stored = store
        .query_records(&RecordQuery::subject_on("s-1", day(12)))
        .await
        .unwrap();
    assert_eq!(stored, vec![record]);
}

#[tokio::test]
async fn update_and_delete_of_unknown_id_report_not_found() {
    let store = store();
    let ghost = entry("s-1", "unit-a", day(12));

    assert!(matches!(
        store.update_record(&ghost).await,
        Err(RecordStoreError::NotFound(id)) if id == ghost.id
    ));
    let missing = Uuid::new_v4();
    assert!(matches!(
        store.delete_record(missing).await,
        Err(RecordStoreError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn delete_by_id_frees_the_day() {
    let store = store();
    let record = entry("s-1", "unit-a", day(12));
    store.insert_record(&record).await.unwrap();

    store.delete_record(record.id).await.unwrap();
    assert!(store
        .query_records(&RecordQuery::subject_on("s-1", day(12)))
        .await
        .unwrap()
        .is_empty());

    store
        .insert_record(&entry("s-1", "unit-a", day(12)))
        .await
        .unwrap();
}

#[tokio::test]
async fn query_filters_by_unit_and_inclusive_date_range() {
    let store = store();
    for (subject, unit, d) in [
        ("s-1", "unit-a", 11),
        ("s-1", "unit-a", 12),
        ("s-2", "unit-a", 13),
        ("s-3", "unit-b", 12),
        ("s-1", "unit-a", 14),
    ] {
        store.insert_record(&entry(subject, unit, day(d))).await.unwrap();
    }

    let query = RecordQuery {
        unit_id: Some("unit-a".to_string()),
        date_from: Some(day(12)),
        date_to: Some(day(13)),
        ..RecordQuery::default()
    };
    let found: Vec<(String, NaiveDate)> = store
        .query_records(&query)
        .await
        .unwrap()
        .into_iter()
        .map(|record| (record.subject_id, record.date))
        .collect();

    assert_eq!(
        found,
        vec![("s-1".to_string(), day(12)), ("s-2".to_string(), day(13))]
    );
    assert_eq!(
        store.query_records(&RecordQuery::default()).await.unwrap().len(),
        5
    );
}

#[tokio::test]
async fn check_out_earlier_than_entry_is_refused() {
    let store = store();
    let record = entry("s-1", "unit-a", day(12));
    store.insert_record(&record).await.unwrap();

    assert!(!store.check_out(record.id, hm(7, 59)).await.unwrap());
    let stored = store
        .query_records(&RecordQuery::subject_on("s-1", day(12)))
        .await
        .unwrap();
    assert!(stored[0].is_open());

    assert!(store.check_out(record.id, hm(8, 0)).await.unwrap());
    assert!(!store.check_out(record.id, hm(17, 0)).await.unwrap());
}
