//! Logging setup for the daemon
//!
//! Console output is either human-readable or JSON. An optional log file is
//! always written as JSON through a non-blocking rolling appender.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Enable JSON logging on the console
    #[serde(default)]
    pub json_logging: bool,
    /// Enable console logging
    #[serde(default = "default_console_logging")]
    pub console_logging: bool,
    /// Local log file path
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
    /// How often the log file is rotated
    #[serde(default)]
    pub log_rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            console_logging: default_console_logging(),
            log_file_path: None,
            log_rotation: LogRotation::default(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_console_logging() -> bool { true }

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Map a configured level name to a tracing level, falling back to info
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Keeps the file writer alive; dropping it flushes buffered lines
pub struct Telemetry {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &TelemetryConfig, level_override: Option<&str>) -> Result<Telemetry> {
    let level = parse_level(level_override.unwrap_or(&config.log_level));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("syncflow={level},syncflow_engine={level}"))
    });

    let console_text = (config.console_logging && !config.json_logging)
        .then(|| fmt::layer().with_target(true));
    let console_json = (config.console_logging && config.json_logging)
        .then(|| fmt::layer().json().with_current_span(true));

    let (file_layer, guard) = match &config.log_file_path {
        Some(log_path) => {
            let directory = log_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = log_path.file_name().unwrap_or_else(|| OsStr::new("syncflow.log"));

            let appender = match config.log_rotation {
                LogRotation::Daily => rolling::daily(directory, file_name),
                LogRotation::Hourly => rolling::hourly(directory, file_name),
                LogRotation::Never => rolling::never(directory, file_name),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .json()
                .with_current_span(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()?;

    Ok(Telemetry { _file_guard: guard })
}
