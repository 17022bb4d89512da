use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use syncflow_engine::{SyncOptions, MIN_TWO_WAY_DELAY_MS};

use crate::telemetry::{TelemetryConfig, LOG_LEVELS};

/// Longest accepted coalescing window
const MAX_SYNC_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Where the last session snapshot is kept
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// The directory pair to mirror and how
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub source_directory: Option<PathBuf>,
    #[serde(default)]
    pub target_directory: Option<PathBuf>,
    #[serde(default)]
    pub options: SyncOptions,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl DaemonConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let config: DaemonConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if given, else the default file, else built-in defaults
    pub async fn load_or_default(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path).await
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.telemetry.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            anyhow::bail!("Unknown log level: {}", self.telemetry.log_level);
        }

        if let Some(source) = &self.sync.source_directory {
            if !source.is_dir() {
                anyhow::bail!("Source directory does not exist: {}", source.display());
            }
        }

        if let Some(target) = &self.sync.target_directory {
            if target.exists() && !target.is_dir() {
                anyhow::bail!("Target path is not a directory: {}", target.display());
            }
            if self.sync.source_directory.as_ref() == Some(target) {
                anyhow::bail!("Source and target directories must differ");
            }
        }

        if self.sync.options.sync_delay_ms > MAX_SYNC_DELAY_MS {
            anyhow::bail!(
                "syncDelayMs must be at most {}, got {}",
                MAX_SYNC_DELAY_MS,
                self.sync.options.sync_delay_ms
            );
        }

        if self.sync.options.is_two_way() && self.sync.options.sync_delay_ms < MIN_TWO_WAY_DELAY_MS {
            anyhow::bail!(
                "syncDelayMs must be at least {} in two-way mode, got {}",
                MIN_TWO_WAY_DELAY_MS,
                self.sync.options.sync_delay_ms
            );
        }

        Ok(())
    }

    /// Starter configuration with example roots and everything else at its default
    pub fn generate() -> Result<String> {
        let mut config = Self::default();
        config.sync.source_directory = Some(PathBuf::from("./source"));
        config.sync.target_directory = Some(PathBuf::from("./target"));
        config.sync.options.exclude = vec![".tmp".to_string()];
        Ok(toml::to_string_pretty(&config)?)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncflow")
        .join("config.toml")
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncflow")
}
