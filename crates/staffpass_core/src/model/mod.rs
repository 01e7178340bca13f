//! Domain model for the check-in protocol and the offline pipeline.
//!
//! # Responsibility
//! - Define canonical data structures shared by token, recorder and sync code.
//! - Keep wire/storage names stable through serde attributes.
//!
//! # Invariants
//! - At most one `AttendanceRecord` exists per `(subject_id, date)`.
//! - `IdentityToken` values are immutable once issued.

pub mod attendance;
pub mod offline;
pub mod token;
