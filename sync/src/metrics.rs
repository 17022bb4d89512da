//! Counters and the bounded recent-activity log kept by the engine

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};

use crate::event::LogEntry;

/// Number of entries kept in the recent-activity log
pub const RECENT_LOG_CAPACITY: usize = 100;

/// Per-session mirroring counters, reset when a session starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Mirrored copies and deletions that succeeded
    pub synced_files: u64,
    /// Mirrored operations that failed
    pub failed_files: u64,
}

impl SyncStats {
    pub fn record_success(&mut self) -> u64 {
        self.synced_files += 1;
        self.synced_files
    }

    pub fn record_failure(&mut self) -> u64 {
        self.failed_files += 1;
        self.failed_files
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Most-recent-first buffer of activity entries.
///
/// Survives session restarts; only `clear` empties it.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(RECENT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest entry when full
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Snapshot of the entries, newest first
    pub fn recent(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
