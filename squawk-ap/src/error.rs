//! Error types for squawk-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for squawk-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed track identifier, rejected at the request boundary
    #[error("Invalid track id: {0}")]
    Validation(String),

    /// External fetch tool failed or its output could not be parsed
    #[error("Fetch failed for {id}: {reason}")]
    FetchFailed { id: String, reason: String },

    /// External player rejected the track
    #[error("Playback load failed for {}: {reason}", path.display())]
    PlaybackLoadFailed { path: PathBuf, reason: String },

    /// Deleting an evicted audio file failed
    #[error("Failed to delete {}: {source}", path.display())]
    EvictionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from squawk-common
    #[error(transparent)]
    Common(#[from] squawk_common::Error),
}

/// Convenience Result type using squawk-ap Error
pub type Result<T> = std::result::Result<T, Error>;
