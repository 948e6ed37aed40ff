//! squawk-ap - Main entry point
//!
//! Wires the fetch serializer, playback queue, controller, and HTTP server
//! together and runs until Ctrl+C or SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use squawk_ap::api::{server, AppContext};
use squawk_ap::audio::RodioOutput;
use squawk_ap::config::{Config, ConfigOverrides, Verbosity};
use squawk_ap::fetcher::YtDlpFetcher;
use squawk_ap::playback::{
    spawn_maintenance, spawn_supervisor, FetchSerializer, PlaybackController, PlaybackQueue,
    RetentionLedger,
};
use squawk_ap::state::SharedState;

/// Command-line arguments for squawk-ap
#[derive(Parser, Debug)]
#[command(name = "squawk-ap")]
#[command(about = "Network-triggered audio queue player")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SQUAWK_PORT")]
    port: Option<u16>,

    /// Fetched tracks held ready to play
    #[arg(long, env = "SQUAWK_QUEUE_SIZE")]
    queue_size: Option<usize>,

    /// Played tracks kept in the log
    #[arg(long, env = "SQUAWK_LOG_SIZE")]
    log_size: Option<usize>,

    /// Played tracks whose files are kept on disk
    #[arg(long, env = "SQUAWK_NUM_FILES")]
    num_files: Option<usize>,

    /// Longest accepted track in seconds (0 for no limit)
    #[arg(long, env = "SQUAWK_MAX_LENGTH")]
    max_length: Option<u64>,

    /// Directory for fetched audio files
    #[arg(long, env = "SQUAWK_AUDIO_DIR")]
    audio_dir: Option<PathBuf>,

    /// Fetch tool executable (yt-dlp or youtube-dl)
    #[arg(long, env = "SQUAWK_FETCH_TOOL")]
    fetch_tool: Option<String>,

    /// Delete leftover files in the audio directory at startup
    #[arg(long)]
    purge: bool,

    /// Log warnings and errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log more detail (-vv for all crates)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let verbosity = if self.quiet {
            Some(Verbosity::Quiet)
        } else if self.verbose > 0 {
            Some(Verbosity::Verbose)
        } else {
            None
        };

        ConfigOverrides {
            port: self.port,
            queue_size: self.queue_size,
            log_size: self.log_size,
            num_files: self.num_files,
            max_length_secs: self.max_length,
            audio_dir: self.audio_dir.clone(),
            fetch_tool: self.fetch_tool.clone(),
            purge_on_startup: self.purge,
            verbosity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = squawk_common::config::resolve_config_path(args.config.as_deref())
        .context("Failed to locate configuration file")?;
    let config = Config::load(config_path.as_deref(), args.overrides())
        .context("Invalid configuration")?;

    let default_filter = if args.verbose >= 2 {
        "debug"
    } else {
        config.verbosity.default_filter()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting squawk-ap v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }
    info!(
        "Queue size {}, log size {}, keeping {} files in {}",
        config.queue_size,
        config.log_size,
        config.num_files,
        config.audio_dir.display()
    );

    tokio::fs::create_dir_all(&config.audio_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.audio_dir.display()))?;
    if config.purge_on_startup {
        let removed = purge_audio_dir(&config.audio_dir)
            .await
            .with_context(|| format!("Failed to purge {}", config.audio_dir.display()))?;
        info!("Purged {} leftover file(s)", removed);
    }

    let backend = Arc::new(RodioOutput::open_default().context("Failed to open audio output")?);
    info!("Audio output initialized");

    let shared = Arc::new(SharedState::new());
    let queue = Arc::new(PlaybackQueue::new(config.queue_size));
    let controller = Arc::new(PlaybackController::new(
        Arc::clone(&queue),
        backend,
        Arc::clone(&shared),
        RetentionLedger::new(config.log_size, config.num_files),
    ));
    let fetcher = Arc::new(YtDlpFetcher::new(
        config.fetch_tool.clone(),
        config.audio_format.clone(),
        config.max_length,
    ));
    let fetch = Arc::new(FetchSerializer::new(
        fetcher,
        Arc::clone(&queue),
        Arc::clone(&shared),
        config.audio_dir.clone(),
    ));

    let cancel = CancellationToken::new();
    let supervisor = spawn_supervisor(
        Arc::clone(&controller),
        config.settle_delay,
        cancel.clone(),
    );
    let maintenance = spawn_maintenance(
        Arc::clone(&controller),
        config.sweep_interval,
        cancel.clone(),
    );

    let ctx = AppContext {
        state: shared,
        controller: Arc::clone(&controller),
        fetch,
    };
    let served = server::run(config.port, ctx, shutdown_signal()).await;

    cancel.cancel();
    for (name, task) in [("supervisor", supervisor), ("maintenance", maintenance)] {
        if let Err(e) = task.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }
    controller.shutdown().await;

    served.context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Remove regular files left in the audio directory by an earlier run
async fn purge_audio_dir(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
