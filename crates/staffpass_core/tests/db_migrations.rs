use rusqlite::Connection;
use staffpass_core::db::migrations::latest_version;
use staffpass_core::db::{open_db, open_db_in_memory, DbError, Schema};

#[test]
fn local_schema_creates_cache_queue_and_session_partitions() {
    let conn = open_db_in_memory(Schema::Local).unwrap();

    assert_eq!(schema_version(&conn), latest_version(Schema::Local));
    assert_table_exists(&conn, "cached_entities");
    assert_table_exists(&conn, "pending_actions");
    assert_table_exists(&conn, "session_values");
    assert_table_missing(&conn, "attendance_records");
}

#[test]
fn authority_schema_creates_directory_records_and_nonce_ledger() {
    let conn = open_db_in_memory(Schema::Authority).unwrap();

    assert_eq!(schema_version(&conn), latest_version(Schema::Authority));
    assert_table_exists(&conn, "subjects");
    assert_table_exists(&conn, "work_schedules");
    assert_table_exists(&conn, "attendance_records");
    assert_table_exists(&conn, "consumed_nonces");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authority.db");

    let conn_first = open_db(&path, Schema::Authority).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version(Schema::Authority));
    drop(conn_first);

    let conn_second = open_db(&path, Schema::Authority).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version(Schema::Authority));
    assert_table_exists(&conn_second, "consumed_nonces");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, Schema::Local).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(Schema::Local));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn second_record_for_same_subject_and_day_violates_unique_index() {
    let conn = open_db_in_memory(Schema::Authority).unwrap();
    let insert = "INSERT INTO attendance_records
        (id, subject_id, unit_id, date, check_in_time, check_out_time, status, recorded_by)
        VALUES (?1, 's-1', 'u-1', '2026-10-12', '08:00:00', NULL, 'present', 'reader');";

    conn.execute(insert, ["a"]).unwrap();
    let err = conn.execute(insert, ["b"]).unwrap_err();
    assert!(DbError::Sqlite(err).is_constraint_violation());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn assert_table_missing(conn: &Connection, table_name: &str) {
    assert!(!table_exists(conn, table_name), "table {table_name} should not exist");
}
