//! streakd - The activity streak service
//!
//! This is the main entry point for the streakd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Streak engine
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use streak_config::load_config_or_default;
use streak_util::{STREAKD_DATA_DIR_ENV, STREAKD_SOCKET_ENV, SystemClock, default_config_path};
use streakd::Service;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// streakd - Activity logging and day streaks
#[derive(Parser, Debug)]
#[command(name = "streakd")]
#[command(about = "Activity logging and day streak service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/streakd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set STREAKD_SOCKET env var)
    #[arg(short, long, env = STREAKD_SOCKET_ENV)]
    socket: Option<PathBuf>,

    /// Data directory override (or set STREAKD_DATA_DIR env var)
    #[arg(short, long, env = STREAKD_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "streakd starting");

    let mut settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(socket) = args.socket {
        settings.service.socket_path = socket;
    }
    if let Some(data_dir) = args.data_dir {
        settings.service.data_dir = data_dir;
    }

    info!(
        config_path = %args.config.display(),
        earliest_activity = %settings.streaks.earliest_activity,
        strict_ordering = settings.streaks.strict_ordering,
        "Configuration loaded"
    );

    let service = Service::new(settings, args.config, Arc::new(SystemClock)).await?;
    service.run().await
}
