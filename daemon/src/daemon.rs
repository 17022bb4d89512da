use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use syncflow_engine::{EngineEvent, ReportChannel, StatusUpdate, SyncEngine};

use crate::config::DaemonConfig;
use crate::session::{SessionSnapshot, SessionStore};

/// Host that drives one engine session until interrupted
pub struct SyncDaemon {
    config: DaemonConfig,
    engine: SyncEngine,
    reports: ReportChannel,
    store: SessionStore,
    snapshot: SessionSnapshot,
}

impl SyncDaemon {
    pub async fn new(config: DaemonConfig) -> Result<Self> {
        info!("Initializing sync daemon");
        config.validate()?;

        let store = SessionStore::new(&config.daemon.state_dir);
        let previous = match store.load().await {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Ignoring unreadable session file: {:#}", e);
                None
            }
        };

        let snapshot = SessionSnapshot {
            clear_recent_at: previous.as_ref().and_then(|p| p.clear_recent_at),
            file_events: previous.map(|p| p.file_events).unwrap_or_default(),
            ..Default::default()
        };

        let (reporter, reports) = ReportChannel::new();
        Ok(Self {
            config,
            engine: SyncEngine::new(reporter),
            reports,
            store,
            snapshot,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        self.start_session().await?;
        info!("Sync daemon started, press Ctrl+C to stop");

        loop {
            tokio::select! {
                _ = self.engine.process_next() => {
                    self.handle_reports().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await?;
        info!("Sync daemon stopped");
        Ok(())
    }

    async fn start_session(&mut self) -> Result<()> {
        let source = configured_root(self.config.sync.source_directory.clone(), "source")?;
        let target = configured_root(self.config.sync.target_directory.clone(), "target")?;
        let options = self.config.sync.options.clone();

        let started = self.engine.start(&source, &target, options).await;
        self.handle_reports().await;
        started.with_context(|| format!("Failed to start syncing {}", source.display()))?;

        if let Some(session) = self.engine.session() {
            self.snapshot.source_path = Some(session.source_root().to_path_buf());
            self.snapshot.target_path = Some(session.target_root().to_path_buf());
            info!(
                mode = %session.mode(),
                source = %session.source_root().display(),
                target = %session.target_root().display(),
                "Mirroring"
            );
        }
        self.snapshot.is_syncing = self.engine.is_syncing();
        self.persist().await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.engine.stop().await?;
        self.handle_reports().await;
        self.snapshot.is_syncing = false;
        self.persist().await;

        let stats = self.engine.stats();
        info!(
            synced = stats.synced_files,
            failed = stats.failed_files,
            "Session summary"
        );
        Ok(())
    }

    /// Apply every queued engine report and persist when activity changed
    async fn handle_reports(&mut self) {
        let mut activity = false;

        for event in self.reports.drain() {
            match event {
                EngineEvent::Status(update) => self.apply_status(&update),
                EngineEvent::FileChange(entry) => {
                    info!(
                        origin = %entry.origin,
                        kind = ?entry.entry_type,
                        path = %entry.path.display(),
                        "File event"
                    );
                    self.snapshot.push_event(entry);
                    activity = true;
                }
                EngineEvent::Notification(notification) => {
                    info!(title = %notification.title, "{}", notification.body);
                }
            }
        }

        if activity {
            self.persist().await;
        }
    }

    fn apply_status(&mut self, update: &StatusUpdate) {
        self.snapshot.status.merge(update);
        if let Some(is_syncing) = update.is_syncing {
            self.snapshot.is_syncing = is_syncing;
        }
        if let Some(message) = &update.error {
            error!("{}", message);
        } else {
            debug!(status = ?self.snapshot.status, "Status updated");
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.snapshot).await {
            warn!("Failed to save session to {}: {:#}", self.store.path().display(), e);
        }
    }
}

fn configured_root(root: Option<PathBuf>, which: &str) -> Result<PathBuf> {
    root.with_context(|| format!("No {} directory configured; pass --{} or set it in the config file", which, which))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncflow_engine::{ChangeEvent, ChangeKind, Side, SyncMode};
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> DaemonConfig {
        let source = temp_dir.path().join("a");
        std::fs::create_dir_all(&source).unwrap();

        let mut config = DaemonConfig::default();
        config.daemon.state_dir = temp_dir.path().join("state");
        config.sync.source_directory = Some(source);
        config.sync.target_directory = Some(temp_dir.path().join("b"));
        config
    }

    #[tokio::test]
    async fn test_session_is_persisted_across_start_and_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let mut daemon = SyncDaemon::new(config(&temp_dir)).await.unwrap();

        daemon.start_session().await.unwrap();
        assert!(daemon.snapshot.is_syncing);
        assert!(daemon.snapshot.status.is_watching);

        let source = daemon.snapshot.source_path.clone().unwrap();
        std::fs::write(source.join("x.txt"), b"hello").unwrap();
        daemon
            .engine
            .handle_event(ChangeEvent::new(Side::Source, ChangeKind::Add, source.join("x.txt")));
        daemon.handle_reports().await;

        assert_eq!(daemon.snapshot.status.synced_files, 1);
        assert_eq!(daemon.snapshot.file_events.len(), 1);

        daemon.shutdown().await.unwrap();

        let store = SessionStore::new(&temp_dir.path().join("state"));
        let saved = store.load().await.unwrap().unwrap();
        assert!(!saved.is_syncing);
        assert!(!saved.status.is_watching);
        assert_eq!(saved.status.synced_files, 1);
        assert_eq!(saved.file_events[0].path, PathBuf::from("x.txt"));
        assert_eq!(saved.file_events[0].label_style, SyncMode::OneWay);
        assert!(temp_dir.path().join("b").join("x.txt").exists());
    }

    #[tokio::test]
    async fn test_previous_activity_is_carried_over() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        let store = SessionStore::new(&config.daemon.state_dir);
        let cleared_at = store.clear_recent().await.unwrap();

        let daemon = SyncDaemon::new(config).await.unwrap();

        assert_eq!(daemon.snapshot.clear_recent_at, Some(cleared_at));
        assert!(daemon.snapshot.file_events.is_empty());
        assert!(!daemon.snapshot.is_syncing);
    }

    #[tokio::test]
    async fn test_missing_target_setting_fails_start() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        config.sync.target_directory = None;

        let mut daemon = SyncDaemon::new(config).await.unwrap();
        assert!(daemon.start_session().await.is_err());
        assert!(!daemon.engine.is_syncing());
    }
}
