//! Reader-side use-case services.
//!
//! # Responsibility
//! - Turn decoded scan events into validated, recorded attendance outcomes.
//! - Keep token, record-store and display concerns behind their own seams.

pub mod activity;
pub mod recorder;
pub mod scan;

pub use activity::{ActivityEntry, ActivityLevel, RecentActivity};
pub use recorder::{AttendanceRecorder, AttendanceWarning, RecordOutcome, RecorderError};
pub use scan::{ScanHook, ScanOutcome, ScanPermit, ScanProcessor, ScanState};
