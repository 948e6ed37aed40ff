//! Retention ledger
//!
//! Most-recent-first history of played tracks. The newest entry and the
//! `keep` entries after it retain their audio files; the file of the entry
//! that reaches index `keep + 1` is deleted on commit. History is capped at
//! `log_size` visible entries, and entries truncated off the end lose their
//! files too.
//!
//! Deletion failures are logged and leave the entry stored. [`RetentionLedger::sweep`]
//! walks everything outside the retention window again and is the recovery
//! path for those failures.

use crate::error::{Error, Result};
use crate::track::{TrackId, TrackRequest, TrackSummary};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A file removed from disk by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct EvictedFile {
    pub request_id: Uuid,
    pub track_id: TrackId,
    pub path: PathBuf,
}

/// Outcome of a commit or sweep
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted: Vec<EvictedFile>,
    /// Paths whose deletion failed; retried by the next sweep
    pub failed: Vec<PathBuf>,
}

impl EvictionReport {
    fn record(&mut self, track: &mut TrackRequest) {
        match evict(track) {
            Ok(Some(evicted)) => self.evicted.push(evicted),
            Ok(None) => {}
            Err(e) => {
                warn!("{}", e);
                if let Error::EvictionIo { path, .. } = e {
                    self.failed.push(path);
                }
            }
        }
    }
}

/// Bounded history of played tracks with disk cleanup
pub struct RetentionLedger {
    /// Front is the most recently committed track
    entries: VecDeque<TrackRequest>,
    /// Tracks truncated off the log whose file could not be deleted
    orphans: Vec<TrackRequest>,
    log_size: usize,
    keep: usize,
    dirty: bool,
}

impl RetentionLedger {
    /// Create a ledger showing `log_size` entries and retaining files for the
    /// newest entry plus `keep` older ones
    pub fn new(log_size: usize, keep: usize) -> Self {
        let log_size = log_size.max(1);
        Self {
            entries: VecDeque::with_capacity(log_size + 1),
            orphans: Vec::new(),
            log_size,
            keep,
            dirty: false,
        }
    }

    /// Index of the first entry outside the retention window
    fn boundary(&self) -> usize {
        self.keep + 1
    }

    /// Record a finished track as the most recent entry
    pub fn commit(&mut self, track: TrackRequest) -> EvictionReport {
        debug!("Ledger commit: {} ({})", track.title, track.id);
        self.entries.push_front(track);

        let mut report = EvictionReport::default();
        let boundary = self.boundary();
        if let Some(entry) = self.entries.get_mut(boundary) {
            report.record(entry);
        }

        while self.entries.len() > self.log_size {
            let Some(mut dropped) = self.entries.pop_back() else {
                break;
            };
            report.record(&mut dropped);
            if dropped.is_stored() {
                self.orphans.push(dropped);
            }
        }

        if !report.failed.is_empty() {
            self.dirty = true;
        }
        report
    }

    /// Delete every stored file outside the retention window
    ///
    /// Running it again without new commits changes nothing.
    pub fn sweep(&mut self) -> EvictionReport {
        let mut report = EvictionReport::default();
        let boundary = self.boundary();

        for entry in self.entries.iter_mut().skip(boundary) {
            report.record(entry);
        }

        let orphans = std::mem::take(&mut self.orphans);
        for mut orphan in orphans {
            report.record(&mut orphan);
            if orphan.is_stored() {
                self.orphans.push(orphan);
            }
        }

        self.dirty = !report.failed.is_empty();
        if !report.evicted.is_empty() {
            info!("Sweep removed {} file(s)", report.evicted.len());
        }
        report
    }

    /// Whether an earlier deletion failed and a sweep is due
    pub fn needs_sweep(&self) -> bool {
        self.dirty
    }

    /// Up to `limit` entries, most recent first
    pub fn entries(&self, limit: usize) -> Vec<TrackSummary> {
        self.entries
            .iter()
            .take(limit)
            .map(TrackRequest::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Delete the track's file if it is still stored
///
/// A file that is already gone counts as deleted.
fn evict(track: &mut TrackRequest) -> Result<Option<EvictedFile>> {
    if !track.is_stored() {
        return Ok(None);
    }
    let Some(path) = track.path().map(Path::to_path_buf) else {
        return Ok(None);
    };

    match std::fs::remove_file(&path) {
        Ok(()) => info!("Deleted {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} already removed", path.display())
        }
        Err(source) => return Err(Error::EvictionIo { path, source }),
    }

    track.mark_evicted();
    Ok(Some(EvictedFile {
        request_id: track.request_id,
        track_id: track.id.clone(),
        path,
    }))
}
