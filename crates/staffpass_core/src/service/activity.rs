//! Bounded display-only log of recent scan outcomes.

use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub at: DateTime<FixedOffset>,
    pub level: ActivityLevel,
    pub subject_id: Option<String>,
    pub message: String,
}

/// Most-recent-first list capped at a fixed capacity.
pub struct RecentActivity {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl RecentActivity {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, entry: ActivityEntry) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Snapshot, newest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityEntry, ActivityLevel, RecentActivity};
    use chrono::DateTime;

    fn entry(message: &str) -> ActivityEntry {
        ActivityEntry {
            at: DateTime::parse_from_rfc3339("2026-10-12T08:00:00-03:00").unwrap(),
            level: ActivityLevel::Success,
            subject_id: None,
            message: message.to_string(),
        }
    }

    #[test]
    fn keeps_newest_entries_first_up_to_capacity() {
        let activity = RecentActivity::new(2);
        activity.push(entry("one"));
        activity.push(entry("two"));
        activity.push(entry("three"));

        let messages: Vec<String> = activity
            .entries()
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        assert_eq!(messages, vec!["three", "two"]);
    }
}
