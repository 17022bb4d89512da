//! Session options accepted by `SyncEngine::start`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest coalescing window used in two-way mode.
///
/// One mirrored copy is observed by the reciprocal watch as several raw
/// events. They must collapse into a single change so that the one echo mark
/// absorbs all of them.
pub const MIN_TWO_WAY_DELAY_MS: u64 = 100;

/// Direction of mirroring for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// Source is authoritative, only the source root is watched
    #[default]
    OneWay,
    /// Both roots are watched and mirror into each other
    TwoWay,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::OneWay => write!(f, "oneWay"),
            SyncMode::TwoWay => write!(f, "twoWay"),
        }
    }
}

/// Language used for host notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

/// Options for a mirroring session
///
/// Every field may be omitted when deserializing; the documented default is
/// used instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Filename patterns excluded from mirroring (exact name or suffix).
    /// `.DS_Store` is always excluded in addition to these.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Reserved. Accepted and kept with the session but never applied.
    #[serde(default)]
    pub include: Vec<String>,
    /// Propagate deletions to the other root (default: true)
    #[serde(default = "default_delete_on_sync")]
    pub delete_on_sync: bool,
    /// Ask the host to show a notification for each mirrored change
    #[serde(default)]
    pub show_notifications: bool,
    /// Notification language
    #[serde(default)]
    pub language: Language,
    /// One-way or two-way mirroring
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Quiet period used by the watcher to coalesce bursts on one path
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            include: Vec::new(),
            delete_on_sync: default_delete_on_sync(),
            show_notifications: false,
            language: Language::default(),
            sync_mode: SyncMode::default(),
            sync_delay_ms: default_sync_delay_ms(),
        }
    }
}

impl SyncOptions {
    /// Options for a two-way session, everything else default
    pub fn two_way() -> Self {
        Self {
            sync_mode: SyncMode::TwoWay,
            ..Default::default()
        }
    }

    pub fn is_two_way(&self) -> bool {
        self.sync_mode == SyncMode::TwoWay
    }

    /// Window the watchers actually use; two-way raises it to the minimum
    pub fn coalesce_window(&self) -> Duration {
        let delay_ms = if self.is_two_way() {
            self.sync_delay_ms.max(MIN_TWO_WAY_DELAY_MS)
        } else {
            self.sync_delay_ms
        };
        Duration::from_millis(delay_ms)
    }
}

fn default_delete_on_sync() -> bool { true }
fn default_sync_delay_ms() -> u64 { 100 }
