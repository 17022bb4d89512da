//! Localized notification text for mirrored changes

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::options::Language;

/// Mirrored operation a notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Copy,
    Delete,
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOperation::Copy => write!(f, "copy"),
            SyncOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Notification the host should display. Delivery is up to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub silent: bool,
}

impl Notification {
    pub fn synced(language: Language, operation: SyncOperation, relative: &Path) -> Self {
        let (title, verb) = match (language, operation) {
            (Language::En, SyncOperation::Copy) => ("File Synced", "Synced"),
            (Language::En, SyncOperation::Delete) => ("File Synced", "Deleted"),
            (Language::Zh, SyncOperation::Copy) => ("文件已同步", "已同步"),
            (Language::Zh, SyncOperation::Delete) => ("文件已同步", "已删除"),
        };

        Self {
            title: title.to_string(),
            body: format!("{}: {}", verb, relative.display()),
            silent: true,
        }
    }
}
