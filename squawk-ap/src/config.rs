//! Configuration management for squawk-ap
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (and their environment variables, via clap)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! Configuration is read once at startup and is immutable afterwards.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_PORT: u16 = 15567;
/// Fetched tracks waiting to be played
pub const DEFAULT_QUEUE_SIZE: usize = 2;
/// Played tracks kept in the visible log
pub const DEFAULT_LOG_SIZE: usize = 25;
pub const DEFAULT_NUM_FILES: usize = 5;
pub const DEFAULT_MAX_LENGTH_SECS: u64 = 600;
pub const DEFAULT_AUDIO_DIR: &str = "audio_files";
pub const DEFAULT_FETCH_TOOL: &str = "yt-dlp";
pub const DEFAULT_AUDIO_FORMAT: &str = "vorbis";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Logging verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Almost no logging
    Quiet,
    /// Log significant interactions
    #[default]
    Normal,
    /// Log everything
    Verbose,
}

impl Verbosity {
    /// Default tracing filter directive when RUST_LOG is not set
    pub fn default_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "squawk_ap=warn,tower_http=warn",
            Verbosity::Normal => "squawk_ap=info,tower_http=info",
            Verbosity::Verbose => "squawk_ap=debug,squawk_common=debug,tower_http=debug",
        }
    }
}

/// Configuration as read from the TOML file; every field is optional
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub queue_size: Option<usize>,
    pub log_size: Option<usize>,
    pub num_files: Option<usize>,
    pub max_length_secs: Option<u64>,
    pub audio_dir: Option<PathBuf>,
    pub fetch_tool: Option<String>,
    pub audio_format: Option<String>,
    pub settle_delay_ms: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub purge_on_startup: Option<bool>,
    pub verbosity: Option<Verbosity>,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub queue_size: Option<usize>,
    pub log_size: Option<usize>,
    pub num_files: Option<usize>,
    pub max_length_secs: Option<u64>,
    pub audio_dir: Option<PathBuf>,
    pub fetch_tool: Option<String>,
    pub purge_on_startup: bool,
    pub verbosity: Option<Verbosity>,
}

/// Complete, validated application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub port: u16,
    /// Playback queue capacity
    pub queue_size: usize,
    /// Visible retention log length
    pub log_size: usize,
    /// Retention window: played tracks whose files are kept
    pub num_files: usize,
    /// Longest track the fetch tool will accept (0 disables the limit)
    pub max_length: Duration,
    /// Absolute storage directory for audio files
    pub audio_dir: PathBuf,
    /// Fetch tool executable
    pub fetch_tool: String,
    /// Audio format the fetch tool converts to
    pub audio_format: String,
    /// Pause after starting playback before trusting player length/position
    pub settle_delay: Duration,
    /// Interval between ledger maintenance sweeps
    pub sweep_interval: Duration,
    /// Delete leftover files in `audio_dir` at startup
    pub purge_on_startup: bool,
    pub verbosity: Verbosity,
}

impl Config {
    /// Load configuration from an optional TOML file plus CLI overrides
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match toml_path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                squawk_common::config::load_toml::<TomlConfig>(path)?
            }
            None => TomlConfig::default(),
        };
        Self::from_parts(toml_config, overrides)
    }

    /// Merge TOML values and overrides over built-in defaults, then validate
    pub fn from_parts(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let audio_dir = overrides
            .audio_dir
            .or(toml_config.audio_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIO_DIR));

        let config = Self {
            port: overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            queue_size: overrides
                .queue_size
                .or(toml_config.queue_size)
                .unwrap_or(DEFAULT_QUEUE_SIZE),
            log_size: overrides
                .log_size
                .or(toml_config.log_size)
                .unwrap_or(DEFAULT_LOG_SIZE),
            num_files: overrides
                .num_files
                .or(toml_config.num_files)
                .unwrap_or(DEFAULT_NUM_FILES),
            max_length: Duration::from_secs(
                overrides
                    .max_length_secs
                    .or(toml_config.max_length_secs)
                    .unwrap_or(DEFAULT_MAX_LENGTH_SECS),
            ),
            audio_dir: squawk_common::config::absolutize(&audio_dir)?,
            fetch_tool: overrides
                .fetch_tool
                .or(toml_config.fetch_tool)
                .unwrap_or_else(|| DEFAULT_FETCH_TOOL.to_string()),
            audio_format: toml_config
                .audio_format
                .unwrap_or_else(|| DEFAULT_AUDIO_FORMAT.to_string()),
            settle_delay: Duration::from_millis(
                toml_config.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            sweep_interval: Duration::from_secs(
                toml_config
                    .sweep_interval_secs
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            purge_on_startup: overrides.purge_on_startup
                || toml_config.purge_on_startup.unwrap_or(false),
            verbosity: overrides
                .verbosity
                .or(toml_config.verbosity)
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(Error::Config("queue_size must be at least 1".to_string()));
        }
        if self.log_size == 0 {
            return Err(Error::Config("log_size must be at least 1".to_string()));
        }
        if self.num_files > self.log_size {
            return Err(Error::Config(format!(
                "num_files ({}) must not exceed log_size ({})",
                self.num_files, self.log_size
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::Config("sweep_interval_secs must be positive".to_string()));
        }
        if self.fetch_tool.trim().is_empty() {
            return Err(Error::Config("fetch_tool must not be empty".to_string()));
        }
        Ok(())
    }
}
