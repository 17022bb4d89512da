//! SyncFlow Engine Library
//!
//! Live directory mirroring between two roots:
//! - One-way mirroring, source authoritative
//! - Two-way mirroring with echo suppression
//! - Filename-based exclusion
//! - Per-session counters and a bounded recent-activity log
//! - Status, activity and notification reports for the host

pub mod echo;
pub mod error;
pub mod event;
pub mod filter;
pub mod metrics;
pub mod notification;
pub mod options;
pub mod report;
pub mod sync_engine;
pub mod watcher;

// Re-export main types
pub use echo::EchoSuppressor;
pub use error::{Result, SyncError, WatchError};
pub use event::{ChangeEvent, ChangeKind, LogEntry, LogType, Route, Side, StatusUpdate, SyncStatus};
pub use filter::PathFilter;
pub use metrics::{ActivityLog, SyncStats, RECENT_LOG_CAPACITY};
pub use notification::{Notification, SyncOperation};
pub use options::{Language, SyncMode, SyncOptions, MIN_TWO_WAY_DELAY_MS};
pub use report::{EngineEvent, ReportChannel, Reporter};
pub use sync_engine::{mirror_path, RunState, SyncEngine, SyncSession};
pub use watcher::{ChangeWatcher, WatchMessage, WatchSignal, MAX_DEPTH};

#[cfg(test)]
mod path_property_tests;
