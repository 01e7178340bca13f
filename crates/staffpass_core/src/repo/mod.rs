//! Record store abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the record store contract consumed by the attendance recorder.
//! - Define the nonce ledger contract consumed by the token validator.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes call `AttendanceRecord::validate()` before SQL mutations.
//! - Uniqueness of `(subject_id, date)` and of nonces is enforced by the
//!   database, not by check-then-act in callers.

pub mod attendance_repo;
pub mod nonce_repo;
