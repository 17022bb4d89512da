//! Recursive change watching for one sync root
//!
//! A `ChangeWatcher` wraps a `notify` watcher. Raw backend events are handed to
//! a pump task which classifies them into the five change kinds the engine
//! understands, coalesces bursts on the same path, and forwards the result onto
//! the engine's single-consumer channel tagged with the session id.
//!
//! Only changes made after the watch is opened are reported. The root is
//! walked once at open, without following links, purely to learn which paths
//! are directories so that later removals can be told apart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::WatchError;
use crate::event::{ChangeEvent, ChangeKind, Side};

/// Deepest directory level below the root that is reported
pub const MAX_DEPTH: usize = 99;

/// What a watch delivers to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum WatchSignal {
    Change(ChangeEvent),
    Failed { side: Side, error: WatchError },
}

/// A signal tagged with the session that opened the watch
#[derive(Debug, Clone, PartialEq)]
pub struct WatchMessage {
    pub session: Uuid,
    pub signal: WatchSignal,
}

/// Live watch of one root
pub struct ChangeWatcher {
    side: Side,
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    pump: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Start watching `root` and forward classified changes to `events_tx`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        side: Side,
        root: &Path,
        session: Uuid,
        coalesce_window: Duration,
        events_tx: mpsc::UnboundedSender<WatchMessage>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::RootMissing(root.to_path_buf()));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        // Runs on the backend's thread; hand off and return immediately.
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let classifier = Classifier::new(side, root);
        let pump = tokio::spawn(pump_events(
            classifier,
            raw_rx,
            Coalescer::new(coalesce_window),
            session,
            events_tx,
        ));

        info!(%session, %side, root = %root.display(), "Watching for changes");

        Ok(Self {
            side,
            root: root.to_path_buf(),
            watcher: Some(watcher),
            pump: Some(pump),
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.watcher.is_some() || self.pump.is_some()
    }

    /// Stop delivery and wait until the pump task has finished.
    ///
    /// Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<(), WatchError> {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                debug!(root = %self.root.display(), "Unwatch failed: {}", e);
            }
        }

        if let Some(pump) = self.pump.take() {
            pump.abort();
            match pump.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    return Err(WatchError::Close {
                        root: self.root.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }

        debug!(side = %self.side, root = %self.root.display(), "Watch closed");
        Ok(())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_events(
    mut classifier: Classifier,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut pending: Coalescer,
    session: Uuid,
    events_tx: mpsc::UnboundedSender<WatchMessage>,
) {
    let side = classifier.side;

    loop {
        let deadline = pending.next_deadline();

        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(raw) = raw else {
                    debug!(%side, "Backend channel closed");
                    break;
                };

                match raw {
                    Ok(event) => {
                        let now = Instant::now();
                        for observed in classifier.classify(&event) {
                            match observed {
                                Observed::Change(change) => pending.push(change, now),
                                Observed::RootRemoved(root) => {
                                    let signal = WatchSignal::Failed {
                                        side,
                                        error: WatchError::RootRemoved(root),
                                    };
                                    if !forward(&events_tx, session, signal) {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(%side, "File watcher error: {}", e);
                        let signal = WatchSignal::Failed { side, error: e.into() };
                        if !forward(&events_tx, session, signal) {
                            return;
                        }
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
        }

        for change in pending.release(Instant::now()) {
            if !forward(&events_tx, session, WatchSignal::Change(change)) {
                return;
            }
        }
    }
}

fn forward(events_tx: &mpsc::UnboundedSender<WatchMessage>, session: Uuid, signal: WatchSignal) -> bool {
    if events_tx.send(WatchMessage { session, signal }).is_err() {
        debug!(%session, "Engine channel closed, stopping watch pump");
        return false;
    }
    true
}

#[derive(Debug, PartialEq)]
enum Observed {
    Change(ChangeEvent),
    RootRemoved(PathBuf),
}

/// Turns raw backend events into typed changes for one root
struct Classifier {
    side: Side,
    root: PathBuf,
    known_dirs: HashSet<PathBuf>,
}

impl Classifier {
    fn new(side: Side, root: &Path) -> Self {
        let known_dirs = WalkDir::new(root)
            .follow_links(false)
            .max_depth(MAX_DEPTH + 1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();

        Self {
            side,
            root: root.to_path_buf(),
            known_dirs,
        }
    }

    fn classify(&mut self, event: &Event) -> Vec<Observed> {
        let mut observed = Vec::new();

        match &event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    self.created(path, false, &mut observed);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    for path in &event.paths {
                        self.removed(path, None, &mut observed);
                    }
                }
                RenameMode::To => {
                    for path in &event.paths {
                        self.created(path, true, &mut observed);
                    }
                }
                RenameMode::Both if event.paths.len() == 2 => {
                    self.removed(&event.paths[0], None, &mut observed);
                    self.created(&event.paths[1], true, &mut observed);
                }
                _ => {
                    for path in &event.paths {
                        if path.symlink_metadata().is_ok() {
                            self.created(path, true, &mut observed);
                        } else {
                            self.removed(path, None, &mut observed);
                        }
                    }
                }
            },
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => {
                for path in &event.paths {
                    self.modified(path, &mut observed);
                }
            }
            EventKind::Remove(kind) => {
                for path in &event.paths {
                    self.removed(path, Some(*kind), &mut observed);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        observed
    }

    fn created(&mut self, path: &Path, moved_in: bool, out: &mut Vec<Observed>) {
        if path == self.root || !self.within_depth(path) {
            return;
        }
        let Ok(metadata) = path.symlink_metadata() else {
            debug!("Created path vanished before it was classified: {}", path.display());
            return;
        };
        if metadata.file_type().is_symlink() {
            debug!("Not following symlink: {}", path.display());
            return;
        }

        if metadata.is_dir() {
            self.known_dirs.insert(path.to_path_buf());
            self.push(ChangeKind::AddDir, path, out);
            // A directory moved into the tree arrives as one event; report
            // what it already contains the way a live creation would.
            if moved_in {
                self.enumerate_moved_in(path, out);
            }
        } else {
            self.push(ChangeKind::Add, path, out);
        }
    }

    fn enumerate_moved_in(&mut self, dir: &Path, out: &mut Vec<Observed>) {
        let entries = WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok());

        for entry in entries {
            let path = entry.path();
            if !self.within_depth(path) || entry.file_type().is_symlink() {
                continue;
            }
            if entry.file_type().is_dir() {
                self.known_dirs.insert(path.to_path_buf());
                self.push(ChangeKind::AddDir, path, out);
            } else {
                self.push(ChangeKind::Add, path, out);
            }
        }
    }

    fn modified(&mut self, path: &Path, out: &mut Vec<Observed>) {
        if path == self.root || !self.within_depth(path) {
            return;
        }
        match path.symlink_metadata() {
            Ok(metadata) if metadata.is_file() => self.push(ChangeKind::Change, path, out),
            _ => {}
        }
    }

    fn removed(&mut self, path: &Path, hint: Option<RemoveKind>, out: &mut Vec<Observed>) {
        if path == self.root {
            out.push(Observed::RootRemoved(path.to_path_buf()));
            return;
        }
        if !self.within_depth(path) {
            return;
        }

        let was_dir = match hint {
            Some(RemoveKind::Folder) => true,
            Some(RemoveKind::File) => false,
            _ => self.known_dirs.contains(path),
        };

        if was_dir {
            self.known_dirs.retain(|dir| !dir.starts_with(path));
            self.push(ChangeKind::UnlinkDir, path, out);
        } else {
            self.push(ChangeKind::Unlink, path, out);
        }
    }

    fn push(&self, kind: ChangeKind, path: &Path, out: &mut Vec<Observed>) {
        out.push(Observed::Change(ChangeEvent::new(self.side, kind, path)));
    }

    fn within_depth(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .map(|relative| relative.components().count() <= MAX_DEPTH + 1)
            .unwrap_or(false)
    }
}

/// A path written continuously is forced out after this many windows
const MAX_HOLD_WINDOWS: u32 = 10;

#[derive(Debug)]
struct PendingChange {
    change: ChangeEvent,
    first_seen: Instant,
    last_seen: Instant,
}

/// Per-path quiet-period buffer.
///
/// Each path is released on its own once it has been quiet for the window, or
/// once it has been held for `MAX_HOLD_WINDOWS` windows while still changing.
/// Paths released together keep first-seen order.
struct Coalescer {
    window: Duration,
    max_hold: Duration,
    pending: Vec<PendingChange>,
}

impl Coalescer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            max_hold: window * MAX_HOLD_WINDOWS,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, change: ChangeEvent, now: Instant) {
        if let Some(existing) = self.pending.iter_mut().find(|p| p.change.path == change.path) {
            existing.change.kind = merge_kinds(existing.change.kind, change.kind);
            existing.last_seen = now;
            return;
        }
        self.pending.push(PendingChange {
            change,
            first_seen: now,
            last_seen: now,
        });
    }

    fn due(&self, pending: &PendingChange) -> Instant {
        (pending.last_seen + self.window).min(pending.first_seen + self.max_hold)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| self.due(p)).min()
    }

    fn release(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let (ready, held): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| self.due(p) <= now);

        self.pending = held;
        ready.into_iter().map(|p| p.change).collect()
    }
}

/// Combine two changes seen on the same path within one quiet period
fn merge_kinds(earlier: ChangeKind, later: ChangeKind) -> ChangeKind {
    use ChangeKind::*;

    match (earlier, later) {
        (Add, Change) => Add,
        (Unlink, Add) | (Unlink, Change) => Change,
        (_, later) => later,
    }
}
