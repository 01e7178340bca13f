//! Wall clock abstraction.
//!
//! Expiry, staleness and lateness are wall-clock comparisons evaluated at the
//! moment of validation; injecting the clock keeps them deterministic.

use chrono::{DateTime, FixedOffset, Local};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    /// Current local date-time of the reading site.
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Host clock in the host's local offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Settable clock for tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
