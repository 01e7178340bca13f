//! Core logic for staffpass: the attendance check-in protocol and the
//! offline mutation pipeline.
//! This crate is the single source of truth for token, attendance and queue
//! invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod offline;
pub mod repo;
pub mod service;
pub mod sync;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig, MIN_SECRET_BYTES};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::attendance::{AttendanceRecord, AttendanceStatus, RecordId, WorkSchedule};
pub use model::offline::{ActionId, ActionKind, CachedEntity, PendingAction};
pub use model::token::{CredentialTrust, IdentityToken, LegacyPayload, Subject, SubjectId};
pub use offline::{
    CacheRead, LocalStore, LocalStoreHandle, OfflineCache, PendingActionQueue, StorageError,
    StorageResult,
};
pub use repo::attendance_repo::{
    AttendanceStore, RecordQuery, RecordStoreError, RecordStoreResult, SqliteAttendanceStore,
    SubjectDirectory,
};
pub use repo::nonce_repo::{NonceLedger, SqliteNonceLedger};
pub use service::{
    AttendanceRecorder, AttendanceWarning, RecentActivity, RecordOutcome, ScanHook, ScanOutcome,
    ScanProcessor, ScanState,
};
pub use sync::{
    Connectivity, ConnectivityMonitor, OfflineWriter, RemoteError, RemoteTable, SyncEngine,
    SyncOutcome, SyncReport, WriteOutcome,
};
pub use token::{
    IssuedToken, LegacyVerifier, TokenAuthority, TokenError, TokenIssuer, TokenResult,
    TokenRotation, TokenValidator, ValidationResponse,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
