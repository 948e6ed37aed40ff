//! Fetch serializer
//!
//! Runs at most one external fetch at a time. The gate is held through the
//! push onto the playback queue, so a full queue holds back the next fetch.

use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::playback::queue::PlaybackQueue;
use crate::state::SharedState;
use crate::track::TrackRequest;
use squawk_common::events::SquawkEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct FetchSerializer {
    gate: Mutex<()>,
    fetcher: Arc<dyn Fetcher>,
    queue: Arc<PlaybackQueue>,
    state: Arc<SharedState>,
    audio_dir: PathBuf,
}

impl FetchSerializer {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        queue: Arc<PlaybackQueue>,
        state: Arc<SharedState>,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            gate: Mutex::new(()),
            fetcher,
            queue,
            state,
            audio_dir,
        }
    }

    /// Fetch `request` and append it to the playback queue
    ///
    /// Waits for any earlier submission to finish first. A failed fetch drops
    /// the request; there is no retry.
    pub async fn submit(&self, mut request: TrackRequest) -> Result<()> {
        let _gate = self.gate.lock().await;
        debug!("Fetch started for {}", request.id);

        match self.fetcher.describe(&request.id).await {
            Ok(info) => {
                request.title = info.title;
                request.duration = info.duration;
            }
            Err(e) => warn!("Title lookup failed, using id as title: {}", e),
        }

        let stem = format!("{}.{}", request.id, request.request_id.simple());
        let path = match self.fetcher.fetch(&request.id, &stem, &self.audio_dir).await {
            Ok(path) => path,
            Err(e) => {
                error!("{}", e);
                remove_partial_files(&self.audio_dir, &stem).await;
                self.state.broadcast_event(SquawkEvent::FetchFailed {
                    request_id: request.request_id,
                    track_id: request.id.to_string(),
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                return Err(e);
            }
        };

        if !request.mark_stored(path) {
            warn!("{} was already stored; keeping its first file", request.id);
        }
        info!("ADD: {} ({})", request.title, request.id);

        let event = SquawkEvent::TrackQueued {
            request_id: request.request_id,
            track_id: request.id.to_string(),
            title: request.title.clone(),
            timestamp: chrono::Utc::now(),
        };
        self.queue.push(request).await;
        self.state.broadcast_event(event);
        Ok(())
    }

    /// Whether a fetch is currently running or waiting to enqueue
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Best-effort removal of anything a failed fetch left behind for `stem`
async fn remove_partial_files(dir: &Path, stem: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem) {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => debug!("Removed partial file {}", entry.path().display()),
                Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
    }
}
