use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use syncflow_engine::{Language, SyncMode};

mod config;
mod daemon;
mod session;
mod telemetry;

use config::DaemonConfig;
use daemon::SyncDaemon;
use session::SessionStore;

#[derive(Parser)]
#[command(name = "syncflow")]
#[command(about = "Live one-way and two-way directory mirroring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the configured directories until interrupted
    Start(StartArgs),
    /// Inspect or clear the last session
    Session {
        #[command(subcommand)]
        action: SessionActions,
    },
    /// Validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(clap::Args, Default)]
struct StartArgs {
    /// Directory whose changes are mirrored
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory that receives the mirrored changes
    #[arg(long)]
    target: Option<PathBuf>,

    /// Watch both directories and mirror in both directions
    #[arg(long)]
    two_way: bool,

    /// File name or suffix to exclude (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Do not propagate deletions
    #[arg(long)]
    no_delete: bool,

    /// Emit a notification for every mirrored change
    #[arg(long)]
    notify: bool,

    /// Notification language
    #[arg(long, value_enum, ignore_case = true)]
    language: Option<LanguageArg>,

    /// Quiet period in milliseconds used to coalesce bursts on one path
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LanguageArg {
    En,
    Zh,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::En => Language::En,
            LanguageArg::Zh => Language::Zh,
        }
    }
}

#[derive(Subcommand)]
enum SessionActions {
    /// Print the last session
    Show,
    /// Forget recent file events
    Clear,
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Validate configuration file
    Validate,
    /// Show current configuration
    Show,
    /// Generate default configuration
    Generate {
        /// Output path for configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { action: ConfigActions::Generate { output } } = &cli.command {
        return generate_config(output.as_ref()).await;
    }

    let mut config = DaemonConfig::load_or_default(cli.config.as_ref()).await?;
    if let Some(level) = &cli.log_level {
        config.telemetry.log_level = level.clone();
    }
    let _telemetry = telemetry::init(&config.telemetry, None)?;

    match cli.command {
        Commands::Start(args) => {
            apply_start_args(&mut config, args);
            run_daemon(config).await
        }
        Commands::Session { action } => match action {
            SessionActions::Show => show_session(&config).await,
            SessionActions::Clear => clear_session(&config).await,
        },
        Commands::Config { action } => match action {
            ConfigActions::Validate => validate_config(&config),
            ConfigActions::Show => show_config(&config),
            ConfigActions::Generate { .. } => Ok(()),
        },
    }
}

/// Command line flags win over the configuration file
fn apply_start_args(config: &mut DaemonConfig, args: StartArgs) {
    let sync = &mut config.sync;

    if let Some(source) = args.source {
        sync.source_directory = Some(source);
    }
    if let Some(target) = args.target {
        sync.target_directory = Some(target);
    }
    if args.two_way {
        sync.options.sync_mode = SyncMode::TwoWay;
    }
    sync.options.exclude.extend(args.exclude);
    if args.no_delete {
        sync.options.delete_on_sync = false;
    }
    if args.notify {
        sync.options.show_notifications = true;
    }
    if let Some(language) = args.language {
        sync.options.language = language.into();
    }
    if let Some(delay_ms) = args.delay_ms {
        sync.options.sync_delay_ms = delay_ms;
    }
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("Starting sync daemon in foreground mode");
    let daemon = SyncDaemon::new(config).await?;
    daemon.run().await
}

async fn show_session(config: &DaemonConfig) -> Result<()> {
    let store = SessionStore::new(&config.daemon.state_dir);

    let Some(snapshot) = store.load().await? else {
        println!("No session recorded yet");
        return Ok(());
    };

    let display = |path: &Option<PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!("Source:  {}", display(&snapshot.source_path));
    println!("Target:  {}", display(&snapshot.target_path));
    println!("Syncing: {}", snapshot.is_syncing);
    println!(
        "Synced:  {}  Failed: {}",
        snapshot.status.synced_files, snapshot.status.failed_files
    );
    if let Some(error) = &snapshot.status.error {
        println!("Last error: {}", error);
    }

    println!("Recent file events: {}", snapshot.file_events.len());
    for entry in &snapshot.file_events {
        let when = chrono::DateTime::from_timestamp_millis(entry.timestamp_ms)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let operation = entry.operation.map(|op| format!(" ({})", op)).unwrap_or_default();
        println!(
            "  {}  {:<9} {}{}  [{}]",
            when,
            serde_json::to_value(entry.entry_type)?.as_str().unwrap_or_default(),
            entry.path.display(),
            operation,
            entry.origin
        );
    }
    Ok(())
}

async fn clear_session(config: &DaemonConfig) -> Result<()> {
    let store = SessionStore::new(&config.daemon.state_dir);
    let cleared_at = store.clear_recent().await?;
    info!(cleared_at, "Cleared recent file events");
    println!("Recent file events cleared");
    Ok(())
}

fn validate_config(config: &DaemonConfig) -> Result<()> {
    match config.validate() {
        Ok(()) => {
            println!("✓ Configuration is valid");
            println!("Mode: {}", config.sync.options.sync_mode);
            println!("State directory: {}", config.daemon.state_dir.display());
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed: {}", e);
            Err(e)
        }
    }
}

fn show_config(config: &DaemonConfig) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn generate_config(output_path: Option<&PathBuf>) -> Result<()> {
    let toml_content = DaemonConfig::generate()?;

    if let Some(path) = output_path {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, toml_content).await?;
        println!("Configuration generated at {}", path.display());
    } else {
        println!("{}", toml_content);
    }

    Ok(())
}
