//! Error types for the mirroring engine

use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures raised while mirroring a single change or managing a session
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A root or changed path that cannot be mirrored
    #[error("Path error at '{}': {reason}", .path.display())]
    Path { path: PathBuf, reason: String },

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Failed to copy '{}' to '{}': {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove '{}': {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors reported by a change watcher.
///
/// These never terminate a session. They are surfaced to the host as
/// `status.error` and the remaining watches keep running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The root to watch does not exist
    #[error("Watch root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    /// The watched root itself was removed while the watch was live
    #[error("Watch root was removed: {}", .0.display())]
    RootRemoved(PathBuf),

    /// The notification backend failed
    #[error("Watcher error: {0}")]
    Backend(String),

    /// The watch could not be shut down cleanly
    #[error("Failed to close watcher for '{}': {message}", .root.display())]
    Close { root: PathBuf, message: String },
}

impl From<notify::Error> for WatchError {
    fn from(error: notify::Error) -> Self {
        Self::Backend(error.to_string())
    }
}

impl SyncError {
    pub fn path_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn copy_error(from: &Path, to: &Path, source: io::Error) -> Self {
        Self::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }

    pub fn remove_error(path: &Path, source: io::Error) -> Self {
        Self::Remove {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn create_dir_error(path: &Path, source: io::Error) -> Self {
        Self::CreateDir {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The destination a failed mutation was aimed at, if any
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Copy { to, .. } => Some(to),
            Self::Remove { path, .. } | Self::CreateDir { path, .. } => Some(path),
            Self::Path { .. } | Self::Watch(_) => None,
        }
    }
}
