//! Live mirroring engine
//!
//! The engine owns at most one session. While a session is running, change
//! watches feed a single channel that the host drains with `process_next` or
//! `process_pending`; every change is filtered, checked against the echo table
//! and mirrored into the opposite root with blocking filesystem calls.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::echo::EchoSuppressor;
use crate::error::{Result, SyncError, WatchError};
use crate::event::{ChangeEvent, ChangeKind, LogEntry, Route, Side, StatusUpdate};
use crate::filter::PathFilter;
use crate::metrics::{ActivityLog, SyncStats};
use crate::notification::{Notification, SyncOperation};
use crate::options::{Language, SyncMode, SyncOptions};
use crate::report::Reporter;
use crate::watcher::{ChangeWatcher, WatchMessage, WatchSignal};

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Roots and options of one running session
#[derive(Debug, Clone)]
pub struct SyncSession {
    id: Uuid,
    source_root: PathBuf,
    target_root: PathBuf,
    options: SyncOptions,
}

impl SyncSession {
    /// Validate and canonicalize the roots of a new session.
    ///
    /// The source root must already exist. A missing target root is created.
    fn resolve(source: &Path, target: &Path, options: SyncOptions) -> Result<Self> {
        if !source.is_dir() {
            return Err(WatchError::RootMissing(source.to_path_buf()).into());
        }

        if !target.exists() {
            std::fs::create_dir_all(target)
                .map_err(|e| SyncError::create_dir_error(target, e))?;
            info!(target = %target.display(), "Created missing target root");
        } else if !target.is_dir() {
            return Err(SyncError::path_error(target, "Target root is not a directory"));
        }

        let source_root = canonical_root(source)?;
        let target_root = canonical_root(target)?;

        if source_root.starts_with(&target_root) || target_root.starts_with(&source_root) {
            return Err(SyncError::path_error(
                &target_root,
                format!("Roots must not overlap with '{}'", source_root.display()),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            source_root,
            target_root,
            options,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn mode(&self) -> SyncMode {
        self.options.sync_mode
    }

    pub fn root(&self, side: Side) -> &Path {
        match side {
            Side::Source => &self.source_root,
            Side::Target => &self.target_root,
        }
    }

    /// Work out where a change should be mirrored to.
    ///
    /// One-way sessions always mirror source to target.
    pub fn route(&self, event: &ChangeEvent) -> Result<Route> {
        let origin = match self.mode() {
            SyncMode::OneWay => Side::Source,
            SyncMode::TwoWay => event.side,
        };
        let from_root = self.root(origin);
        let to_root = self.root(origin.opposite());
        let (relative, destination) = mirror_path(from_root, to_root, &event.path)?;

        Ok(Route {
            origin,
            mode: self.mode(),
            from_root: from_root.to_path_buf(),
            to_root: to_root.to_path_buf(),
            relative,
            destination,
        })
    }
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| SyncError::path_error(path, format!("Failed to resolve root: {}", e)))
}

/// Map `path` under `from_root` to the same relative location under `to_root`.
///
/// Returns the relative path and the destination.
pub fn mirror_path(from_root: &Path, to_root: &Path, path: &Path) -> Result<(PathBuf, PathBuf)> {
    let relative = path.strip_prefix(from_root).map_err(|_| {
        SyncError::path_error(path, format!("Path is outside root '{}'", from_root.display()))
    })?;

    if relative.as_os_str().is_empty() {
        return Err(SyncError::path_error(path, "Path is the root itself"));
    }

    Ok((relative.to_path_buf(), to_root.join(relative)))
}

/// Per-event view of the session options
#[derive(Debug, Clone, Copy)]
struct Policy {
    two_way: bool,
    delete_on_sync: bool,
    notify: Option<Language>,
}

impl Policy {
    fn from_options(options: &SyncOptions) -> Self {
        Self {
            two_way: options.is_two_way(),
            delete_on_sync: options.delete_on_sync,
            notify: options.show_notifications.then_some(options.language),
        }
    }
}

/// Main sync engine
pub struct SyncEngine {
    state: RunState,
    session: Option<SyncSession>,
    watches: Vec<ChangeWatcher>,
    filter: PathFilter,
    suppressor: EchoSuppressor,
    stats: SyncStats,
    activity: ActivityLog,
    reporter: Reporter,
    events_tx: mpsc::UnboundedSender<WatchMessage>,
    events_rx: mpsc::UnboundedReceiver<WatchMessage>,
}

impl SyncEngine {
    /// Create an idle engine that reports to `reporter`
    pub fn new(reporter: Reporter) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            state: RunState::Idle,
            session: None,
            watches: Vec::new(),
            filter: PathFilter::default(),
            suppressor: EchoSuppressor::new(),
            stats: SyncStats::default(),
            activity: ActivityLog::default(),
            reporter,
            events_tx,
            events_rx,
        }
    }

    /// Start mirroring `source` into `target`.
    ///
    /// A running session is stopped first. On failure every watch opened so
    /// far is closed, an error status is reported and the engine is left idle.
    pub async fn start(
        &mut self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        options: SyncOptions,
    ) -> Result<()> {
        if self.state != RunState::Idle || !self.watches.is_empty() {
            info!("Stopping the running session before restart");
            self.stop().await?;
        }

        self.state = RunState::Starting;
        self.stats.reset();
        self.suppressor.clear();
        self.filter = PathFilter::new(&options.exclude);

        let session = match SyncSession::resolve(source.as_ref(), target.as_ref(), options) {
            Ok(session) => session,
            Err(e) => return Err(self.abort_start(e)),
        };

        let sides: &[Side] = match session.mode() {
            SyncMode::OneWay => &[Side::Source],
            SyncMode::TwoWay => &[Side::Source, Side::Target],
        };
        let window = session.options().coalesce_window();
        if window.as_millis() > u128::from(session.options().sync_delay_ms) {
            warn!(
                requested_ms = session.options().sync_delay_ms,
                window_ms = window.as_millis() as u64,
                "Coalescing window raised for two-way mirroring"
            );
        }

        for &side in sides {
            let opened = ChangeWatcher::open(
                side,
                session.root(side),
                session.id(),
                window,
                self.events_tx.clone(),
            );
            match opened {
                Ok(watch) => self.watches.push(watch),
                Err(e) => {
                    self.close_watches().await;
                    return Err(self.abort_start(e.into()));
                }
            }
        }

        info!(
            session_id = %session.id(),
            mode = %session.mode(),
            source = %session.source_root().display(),
            target = %session.target_root().display(),
            "Sync session started"
        );

        self.session = Some(session);
        self.state = RunState::Running;
        self.reporter.status(StatusUpdate::started());
        Ok(())
    }

    fn abort_start(&mut self, error: SyncError) -> SyncError {
        error!("Failed to start sync: {}", error);
        self.state = RunState::Idle;
        self.reporter.status(StatusUpdate {
            is_watching: Some(false),
            is_syncing: Some(false),
            error: Some(error.to_string()),
            ..Default::default()
        });
        error
    }

    /// Close every watch and return to idle.
    ///
    /// Safe to call at any time, including when nothing is running.
    pub async fn stop(&mut self) -> Result<()> {
        self.state = RunState::Stopping;
        self.close_watches().await;

        let discarded = self.drain_stale();
        if let Some(session) = self.session.take() {
            info!(
                session_id = %session.id(),
                discarded,
                synced = self.stats.synced_files,
                failed = self.stats.failed_files,
                "Sync session stopped"
            );
        } else {
            debug!("Stop requested with no active session");
        }

        self.state = RunState::Idle;
        self.reporter.status(StatusUpdate::stopped());
        Ok(())
    }

    async fn close_watches(&mut self) {
        let watches = std::mem::take(&mut self.watches);
        for mut watch in watches {
            if let Err(e) = watch.close().await {
                warn!(side = %watch.side(), "Failed to close watch: {}", e);
            }
        }
    }

    fn drain_stale(&mut self) -> usize {
        let mut discarded = 0;
        while self.events_rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Wait for the next watch message and handle it.
    ///
    /// Returns whether the message belonged to the running session. Pending
    /// forever while idle, so hosts should await it inside `select!`.
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(message) => self.dispatch(message),
            None => false,
        }
    }

    /// Handle every queued watch message without waiting
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.events_rx.try_recv() {
            if self.dispatch(message) {
                handled += 1;
            }
        }
        handled
    }

    fn dispatch(&mut self, message: WatchMessage) -> bool {
        let current = self.session.as_ref().map(SyncSession::id);
        if self.state != RunState::Running || current != Some(message.session) {
            warn!(session_id = %message.session, "Discarding message from a closed session");
            return false;
        }

        match message.signal {
            WatchSignal::Change(event) => self.handle_event(event),
            WatchSignal::Failed { side, error } => self.handle_watch_error(side, error),
        }
        true
    }

    /// Mirror one observed change. Ignored unless a session is running.
    pub fn handle_event(&mut self, event: ChangeEvent) {
        if self.state != RunState::Running {
            debug!(path = %event.path.display(), "Engine not running, ignoring {}", event.kind);
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let policy = Policy::from_options(session.options());

        if policy.two_way && self.suppressor.consume(&event.path) {
            debug!(path = %event.path.display(), "Discarding echo of mirrored {}", event.kind);
            return;
        }

        let route = match session.route(&event) {
            Ok(route) => route,
            Err(e) => {
                self.record_failure(&event.path, &e);
                return;
            }
        };

        if self.filter.should_ignore(&event.path) {
            self.record(LogEntry::skipped(event.kind, &route));
            return;
        }

        let outcome = match event.kind {
            ChangeKind::Add | ChangeKind::Change => self.mirror_file(event.kind, &event.path, &route, policy),
            ChangeKind::Unlink => self.mirror_unlink(&route, policy),
            ChangeKind::AddDir => self.mirror_add_dir(&route),
            ChangeKind::UnlinkDir => self.mirror_unlink_dir(&route, policy),
        };

        if let Err(e) = outcome {
            self.record_failure(&route.relative, &e);
        }
    }

    fn mirror_file(&mut self, kind: ChangeKind, source: &Path, route: &Route, policy: Policy) -> Result<()> {
        let destination = &route.destination;
        self.record(LogEntry::mirrored(kind, route));

        if let Some(parent) = destination.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| SyncError::create_dir_error(parent, e))?;
            }
        }

        if policy.two_way {
            self.suppressor.mark(destination);
        }
        if let Err(e) = std::fs::copy(source, destination) {
            self.suppressor.consume(destination);
            return Err(SyncError::copy_error(source, destination, e));
        }

        info!(origin = %route.origin, path = %route.relative.display(), "Mirrored {}", kind);
        self.record_success(SyncOperation::Copy, route, policy);
        Ok(())
    }

    fn mirror_unlink(&mut self, route: &Route, policy: Policy) -> Result<()> {
        if !policy.delete_on_sync {
            info!(path = %route.relative.display(), "Deletion sync disabled, skipping unlink");
            self.record(LogEntry::skipped(ChangeKind::Unlink, route));
            return Ok(());
        }

        let destination = &route.destination;
        if destination.symlink_metadata().is_err() {
            debug!(path = %destination.display(), "Nothing to delete");
            return Ok(());
        }

        self.record(LogEntry::mirrored(ChangeKind::Unlink, route));
        if policy.two_way {
            self.suppressor.mark(destination);
        }
        if let Err(e) = std::fs::remove_file(destination) {
            self.suppressor.consume(destination);
            return Err(SyncError::remove_error(destination, e));
        }

        info!(origin = %route.origin, path = %route.relative.display(), "Mirrored unlink");
        self.record_success(SyncOperation::Delete, route, policy);
        Ok(())
    }

    fn mirror_add_dir(&mut self, route: &Route) -> Result<()> {
        self.record(LogEntry::mirrored(ChangeKind::AddDir, route));

        let destination = &route.destination;
        if !destination.exists() {
            std::fs::create_dir_all(destination)
                .map_err(|e| SyncError::create_dir_error(destination, e))?;
            info!(origin = %route.origin, path = %route.relative.display(), "Mirrored addDir");
        }
        Ok(())
    }

    fn mirror_unlink_dir(&mut self, route: &Route, policy: Policy) -> Result<()> {
        if !policy.delete_on_sync {
            info!(path = %route.relative.display(), "Deletion sync disabled, skipping unlinkDir");
            self.record(LogEntry::skipped(ChangeKind::UnlinkDir, route));
            return Ok(());
        }

        let destination = &route.destination;
        if !destination.exists() {
            debug!(path = %destination.display(), "Nothing to delete");
            return Ok(());
        }

        self.record(LogEntry::mirrored(ChangeKind::UnlinkDir, route));
        if policy.two_way {
            self.suppressor.mark(destination);
        }
        if let Err(e) = std::fs::remove_dir_all(destination) {
            self.suppressor.consume(destination);
            return Err(SyncError::remove_error(destination, e));
        }

        info!(origin = %route.origin, path = %route.relative.display(), "Mirrored unlinkDir");
        Ok(())
    }

    /// Report a watch failure. The session keeps running.
    pub fn handle_watch_error(&mut self, side: Side, error: WatchError) {
        error!(%side, "Watch error: {}", error);
        self.reporter.status(StatusUpdate::error(error.to_string()));
    }

    fn record(&mut self, entry: LogEntry) {
        self.activity.push(entry.clone());
        self.reporter.file_change(entry);
    }

    fn record_success(&mut self, operation: SyncOperation, route: &Route, policy: Policy) {
        let synced = self.stats.record_success();
        self.reporter.status(StatusUpdate::synced(synced));

        if let Some(language) = policy.notify {
            self.reporter
                .notification(Notification::synced(language, operation, &route.relative));
        }
    }

    fn record_failure(&mut self, relative: &Path, error: &SyncError) {
        let failed = self.stats.record_failure();
        let message = format!("Failed to sync {}: {}", relative.display(), error);
        error!(path = %relative.display(), destination = ?error.destination(), "{}", message);
        self.reporter.status(StatusUpdate::failed(failed, message));
    }

    pub fn is_syncing(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Recent activity, newest first
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.activity.recent()
    }

    /// Empty the activity log. Counters are left alone.
    pub fn clear_recent_logs(&mut self) {
        self.activity.clear();
    }

    /// Number of watches currently open
    pub fn watch_count(&self) -> usize {
        self.watches.iter().filter(|watch| watch.is_open()).count()
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<WatchMessage> {
        self.events_tx.clone()
    }
}
