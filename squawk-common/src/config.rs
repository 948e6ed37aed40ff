//! Configuration file discovery and loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SQUAWK_CONFIG";

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `SQUAWK_CONFIG` environment variable
/// 3. `~/.config/squawk/config.toml`
/// 4. `/etc/squawk/config.toml` (Linux only)
///
/// An explicitly named file (1 or 2) must exist. When nothing is named and no
/// default file exists, `Ok(None)` is returned and built-in defaults apply.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_arg {
        return require_file(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return require_file(PathBuf::from(path));
        }
    }

    Ok(default_config_candidates().into_iter().find(|p| p.is_file()))
}

fn require_file(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.is_file() {
        Ok(Some(path))
    } else {
        Err(Error::NotFound(format!("config file {}", path.display())))
    }
}

/// Default config file locations, most specific first
pub fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("squawk").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/squawk/config.toml"));
    }
    candidates
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    debug!("Loaded TOML configuration from {}", path.display());
    Ok(parsed)
}

/// Resolve `path` against the current working directory when relative
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
