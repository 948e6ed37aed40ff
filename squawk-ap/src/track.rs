//! Track identifiers and track requests
//!
//! A `TrackRequest` moves through fetch → queue → now playing → ledger and is
//! owned by exactly one of those stages at a time.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Required identifier length in characters
pub const TRACK_ID_LEN: usize = 11;

/// Validated external track identifier
///
/// Exactly [`TRACK_ID_LEN`] characters, each an ASCII word character
/// (`A-Z`, `a-z`, `0-9`, `_`) or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Validate and wrap a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.chars().count() != TRACK_ID_LEN {
            return Err(Error::Validation(format!(
                "'{}' must be exactly {} characters",
                raw, TRACK_ID_LEN
            )));
        }
        if let Some(bad) = raw.chars().find(|c| !is_id_char(*c)) {
            return Err(Error::Validation(format!(
                "'{}' contains invalid character '{}'",
                raw, bad
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TrackId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// On-disk state of a track's audio file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// Not fetched yet
    Pending,
    /// Fetched and present on disk
    Stored(PathBuf),
    /// File deleted after leaving the retention window
    Evicted(PathBuf),
}

/// A single add-request flowing through the pipeline
#[derive(Debug)]
pub struct TrackRequest {
    /// Unique per request; the same id may be requested twice
    pub request_id: Uuid,
    pub id: TrackId,
    pub title: String,
    /// Known track length, when the fetch tool or player reports one
    pub duration: Option<Duration>,
    file: FileState,
}

impl TrackRequest {
    pub fn new(id: TrackId) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            title: id.to_string(),
            id,
            duration: None,
            file: FileState::Pending,
        }
    }

    /// Record the fetched file. Only the first call on a pending track has
    /// any effect; returns whether the state changed.
    pub fn mark_stored(&mut self, path: PathBuf) -> bool {
        if self.file != FileState::Pending {
            return false;
        }
        self.file = FileState::Stored(path);
        true
    }

    /// Record that the stored file was deleted. Returns whether the state changed.
    pub fn mark_evicted(&mut self) -> bool {
        match std::mem::replace(&mut self.file, FileState::Pending) {
            FileState::Stored(path) => {
                self.file = FileState::Evicted(path);
                true
            }
            other => {
                self.file = other;
                false
            }
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self.file, FileState::Stored(_))
    }

    pub fn file_state(&self) -> &FileState {
        &self.file
    }

    /// Path of the fetched file, whether or not it is still on disk
    pub fn path(&self) -> Option<&Path> {
        match &self.file {
            FileState::Pending => None,
            FileState::Stored(p) | FileState::Evicted(p) => Some(p),
        }
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            request_id: self.request_id,
            id: self.id.to_string(),
            title: self.title.clone(),
            stored: self.is_stored(),
        }
    }
}

/// Serializable view of a track for status responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackSummary {
    pub request_id: Uuid,
    pub id: String,
    pub title: String,
    pub stored: bool,
}
