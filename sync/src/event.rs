//! Change events, activity log entries, and status records

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::options::SyncMode;

/// Which watched root a change was observed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    /// The root a change on this side is mirrored into
    pub fn opposite(self) -> Self {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Kind of filesystem change reported by a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
}

impl ChangeKind {
    pub fn is_removal(self) -> bool {
        matches!(self, ChangeKind::Unlink | ChangeKind::UnlinkDir)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, ChangeKind::AddDir | ChangeKind::UnlinkDir)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "add"),
            ChangeKind::Change => write!(f, "change"),
            ChangeKind::Unlink => write!(f, "unlink"),
            ChangeKind::AddDir => write!(f, "addDir"),
            ChangeKind::UnlinkDir => write!(f, "unlinkDir"),
        }
    }
}

/// A single change observed under one of the session roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Absolute path of the changed entry
    pub path: PathBuf,
    /// Root the change was observed under
    pub side: Side,
}

impl ChangeEvent {
    pub fn new(side: Side, kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            side,
        }
    }
}

/// Type tag of an activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogType {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
    Skipped,
}

impl From<ChangeKind> for LogType {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Add => LogType::Add,
            ChangeKind::Change => LogType::Change,
            ChangeKind::Unlink => LogType::Unlink,
            ChangeKind::AddDir => LogType::AddDir,
            ChangeKind::UnlinkDir => LogType::UnlinkDir,
        }
    }
}

/// One row of the recent-activity log, also forwarded to the host as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub entry_type: LogType,
    /// Path relative to the root the change was observed under
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub origin: Side,
    pub from_dir: PathBuf,
    pub to_dir: PathBuf,
    pub label_style: SyncMode,
    /// The kind that was skipped; only set when `entry_type` is `Skipped`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<ChangeKind>,
}

impl LogEntry {
    /// Entry for a change that is being mirrored
    pub fn mirrored(kind: ChangeKind, route: &Route) -> Self {
        Self::build(kind.into(), None, route)
    }

    /// Entry for a change that was observed but intentionally not mirrored
    pub fn skipped(kind: ChangeKind, route: &Route) -> Self {
        Self::build(LogType::Skipped, Some(kind), route)
    }

    fn build(entry_type: LogType, operation: Option<ChangeKind>, route: &Route) -> Self {
        Self {
            entry_type,
            path: route.relative.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            origin: route.origin,
            from_dir: route.from_root.clone(),
            to_dir: route.to_root.clone(),
            label_style: route.mode,
            operation,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.entry_type == LogType::Skipped
    }
}

/// Direction and path mapping resolved for one change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Side the change was observed on
    pub origin: Side,
    pub mode: SyncMode,
    pub from_root: PathBuf,
    pub to_root: PathBuf,
    /// Path of the change relative to `from_root`
    pub relative: PathBuf,
    /// `to_root` joined with `relative`
    pub destination: PathBuf,
}

/// Partial status record. The host merges present fields over its previous
/// view and never replaces the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_watching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_syncing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn started() -> Self {
        Self {
            is_watching: Some(true),
            is_syncing: Some(true),
            synced_files: Some(0),
            failed_files: Some(0),
            ..Default::default()
        }
    }

    pub fn stopped() -> Self {
        Self {
            is_watching: Some(false),
            is_syncing: Some(false),
            ..Default::default()
        }
    }

    pub fn synced(synced_files: u64) -> Self {
        Self {
            synced_files: Some(synced_files),
            last_sync_time: Some(chrono::Utc::now().timestamp_millis()),
            ..Default::default()
        }
    }

    pub fn failed(failed_files: u64, error: impl Into<String>) -> Self {
        Self {
            failed_files: Some(failed_files),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Host-side view of the engine status built by merging `StatusUpdate`s
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_watching: bool,
    pub is_syncing: bool,
    pub synced_files: u64,
    pub failed_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatus {
    /// Overlay the fields present in `update`, keeping everything else
    pub fn merge(&mut self, update: &StatusUpdate) {
        if let Some(is_watching) = update.is_watching {
            self.is_watching = is_watching;
        }
        if let Some(is_syncing) = update.is_syncing {
            self.is_syncing = is_syncing;
        }
        if let Some(synced_files) = update.synced_files {
            self.synced_files = synced_files;
        }
        if let Some(failed_files) = update.failed_files {
            self.failed_files = failed_files;
        }
        if let Some(last_sync_time) = update.last_sync_time {
            self.last_sync_time = Some(last_sync_time);
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn route(from: &Path, to: &Path) -> Route {
        Route {
            origin: Side::Target,
            mode: SyncMode::TwoWay,
            from_root: from.to_path_buf(),
            to_root: to.to_path_buf(),
            relative: PathBuf::from("x.txt"),
            destination: from.join("x.txt"),
        }
    }

    #[test]
    fn test_skipped_entry_wire_format() {
        let entry = LogEntry::skipped(ChangeKind::Unlink, &route(Path::new("/b"), Path::new("/a")));
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["type"], json!("skipped"));
        assert_eq!(value["path"], json!("x.txt"));
        assert_eq!(value["origin"], json!("target"));
        assert_eq!(value["fromDir"], json!("/b"));
        assert_eq!(value["toDir"], json!("/a"));
        assert_eq!(value["labelStyle"], json!("twoWay"));
        assert_eq!(value["operation"], json!("unlink"));
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_operation_absent_for_mirrored_entries() {
        let entry = LogEntry::mirrored(ChangeKind::AddDir, &route(Path::new("/b"), Path::new("/a")));
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["type"], json!("addDir"));
        assert!(value.get("operation").is_none());
    }

    #[test]
    fn test_status_update_serializes_only_present_fields() {
        let value = serde_json::to_value(StatusUpdate::stopped()).unwrap();
        assert_eq!(value, json!({"isWatching": false, "isSyncing": false}));
    }

    #[test]
    fn test_status_merge_keeps_absent_fields() {
        let mut status = SyncStatus::default();
        status.merge(&StatusUpdate::started());
        status.merge(&StatusUpdate::synced(3));
        status.merge(&StatusUpdate::failed(1, "Failed to sync a.txt: denied"));

        assert!(status.is_watching);
        assert!(status.is_syncing);
        assert_eq!(status.synced_files, 3);
        assert_eq!(status.failed_files, 1);
        assert!(status.last_sync_time.is_some());
        assert_eq!(status.error.as_deref(), Some("Failed to sync a.txt: denied"));

        status.merge(&StatusUpdate::stopped());
        assert!(!status.is_watching);
        assert_eq!(status.synced_files, 3);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Source.opposite(), Side::Target);
        assert_eq!(Side::Target.opposite(), Side::Source);
    }
}
