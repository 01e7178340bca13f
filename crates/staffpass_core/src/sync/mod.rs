//! Offline-first sync pipeline.
//!
//! # Responsibility
//! - Observe connectivity and drain the pending-action queue when online.
//! - Route local mutations either straight to the remote store or into the
//!   queue when the remote store cannot be reached.
//!
//! # Invariants
//! - Delivery is at-least-once; a queued action is removed only after the
//!   remote store accepted it.
//! - At most one drain pass runs per engine at any time.

pub mod connectivity;
pub mod engine;
pub mod remote;
pub mod writer;

pub use connectivity::{Connectivity, ConnectivityMonitor, LinkQuality};
pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use remote::{EntityFetcher, RemoteError, RemoteResult, RemoteTable};
pub use writer::{OfflineWriter, WriteOutcome};
