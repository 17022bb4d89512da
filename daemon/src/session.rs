//! Persistence of the last sync session between daemon runs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use syncflow_engine::{LogEntry, SyncStatus, RECENT_LOG_CAPACITY};

const SESSION_FILE: &str = "last-session.json";

/// What the daemon remembers about the most recent session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,
    #[serde(default)]
    pub is_syncing: bool,
    /// Activity entries, newest first
    #[serde(default)]
    pub file_events: Vec<LogEntry>,
    #[serde(default)]
    pub status: SyncStatus,
    /// Entries at or before this time (ms) were cleared by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_recent_at: Option<i64>,
}

impl SessionSnapshot {
    /// Record a new activity entry, keeping the newest ones
    pub fn push_event(&mut self, entry: LogEntry) {
        self.file_events.insert(0, entry);
        self.file_events.truncate(RECENT_LOG_CAPACITY);
    }

    fn drop_cleared(&mut self) {
        if let Some(cleared_at) = self.clear_recent_at {
            self.file_events.retain(|entry| entry.timestamp_ms > cleared_at);
        }
    }
}

/// JSON file holding the last `SessionSnapshot`
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored snapshot, without entries cleared by the user
    pub async fn load(&self) -> Result<Option<SessionSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read session {}", self.path.display()))?;
        let mut snapshot: SessionSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Invalid session file {}", self.path.display()))?;
        snapshot.drop_cleared();
        Ok(Some(snapshot))
    }

    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    /// Forget stored activity and remember when that happened
    pub async fn clear_recent(&self) -> Result<i64> {
        let mut snapshot = self.load().await?.unwrap_or_default();
        let cleared_at = chrono::Utc::now().timestamp_millis();

        snapshot.file_events.clear();
        snapshot.clear_recent_at = Some(cleared_at);
        self.save(&snapshot).await?;
        Ok(cleared_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncflow_engine::{ChangeKind, Route, Side, SyncMode};
    use tempfile::TempDir;

    fn entry(name: &str, timestamp_ms: i64) -> LogEntry {
        let route = Route {
            origin: Side::Source,
            mode: SyncMode::OneWay,
            from_root: PathBuf::from("/a"),
            to_root: PathBuf::from("/b"),
            relative: PathBuf::from(name),
            destination: PathBuf::from("/b").join(name),
        };
        let mut entry = LogEntry::mirrored(ChangeKind::Add, &route);
        entry.timestamp_ms = timestamp_ms;
        entry
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(&temp_dir.path().join("state"));

        let mut snapshot = SessionSnapshot {
            source_path: Some(PathBuf::from("/a")),
            target_path: Some(PathBuf::from("/b")),
            is_syncing: true,
            ..Default::default()
        };
        snapshot.push_event(entry("x.txt", 10));
        snapshot.status.synced_files = 1;
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_clear_recent_filters_older_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let mut snapshot = SessionSnapshot::default();
        snapshot.push_event(entry("old.txt", 1));
        store.save(&snapshot).await.unwrap();

        let cleared_at = store.clear_recent().await.unwrap();
        let mut reloaded = store.load().await.unwrap().unwrap();
        assert!(reloaded.file_events.is_empty());
        assert_eq!(reloaded.clear_recent_at, Some(cleared_at));

        // A later run writes both stale and fresh entries back
        reloaded.push_event(entry("stale.txt", cleared_at - 5));
        reloaded.push_event(entry("fresh.txt", cleared_at + 5));
        store.save(&reloaded).await.unwrap();

        let events = store.load().await.unwrap().unwrap().file_events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, PathBuf::from("fresh.txt"));
    }

    #[test]
    fn test_push_event_is_bounded() {
        let mut snapshot = SessionSnapshot::default();
        for i in 0..(RECENT_LOG_CAPACITY + 3) {
            snapshot.push_event(entry(&format!("f{i}"), i as i64));
        }

        assert_eq!(snapshot.file_events.len(), RECENT_LOG_CAPACITY);
        assert_eq!(snapshot.file_events[0].path, PathBuf::from(format!("f{}", RECENT_LOG_CAPACITY + 2)));
    }

    #[test]
    fn test_wire_names() {
        let snapshot = SessionSnapshot {
            source_path: Some(PathBuf::from("/a")),
            clear_recent_at: Some(5),
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["sourcePath"], "/a");
        assert_eq!(value["isSyncing"], false);
        assert_eq!(value["clearRecentAt"], 5);
        assert!(value["fileEvents"].as_array().unwrap().is_empty());
    }
}
