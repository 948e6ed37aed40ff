//! Playback controller
//!
//! Owns the now-playing slot and the retention ledger, and is the only code
//! that changes either. Advancing is single-flight: while one advance is in
//! progress further attempts return [`AdvanceOutcome::Coalesced`] at once.
//!
//! **States:** Idle (nothing playing) → Playing → Advancing (transient).
//! A track the player rejects stays in the slot marked stalled until the
//! next explicit skip.

use crate::audio::{AudioBackend, MediaHandle, PlayerState};
use crate::error::{Error, Result};
use crate::playback::ledger::{EvictionReport, RetentionLedger};
use crate::playback::queue::PlaybackQueue;
use crate::state::SharedState;
use crate::track::{TrackRequest, TrackSummary};
use serde::Serialize;
use squawk_common::events::SquawkEvent;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info};

/// Result of an advance attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Next track loaded and playing
    Advanced,
    /// Next track taken from the queue but the player rejected it
    Stalled,
    /// Another advance was already in flight
    Coalesced,
}

/// The track currently in the player
struct NowPlaying {
    track: TrackRequest,
    media: Option<MediaHandle>,
    stalled: bool,
    generation: u64,
}

struct ControllerState {
    now_playing: Option<NowPlaying>,
    ledger: RetentionLedger,
    generation: u64,
}

/// Clears the advance flag when an advance finishes, however it finishes
struct AdvanceGuard<'a>(&'a AtomicBool);

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Now-playing part of [`PlaybackStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct NowPlayingStatus {
    #[serde(flatten)]
    pub track: TrackSummary,
    pub elapsed_ms: u64,
    pub remaining_ms: Option<u64>,
    pub stalled: bool,
}

/// Point-in-time view of the player, queue, and recent history
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub now_playing: Option<NowPlayingStatus>,
    pub playing: bool,
    pub queue: Vec<TrackSummary>,
    pub queue_capacity: usize,
    pub recent: Vec<TrackSummary>,
}

/// Number of ledger entries included in [`PlaybackStatus::recent`]
const STATUS_RECENT: usize = 5;

pub struct PlaybackController {
    queue: Arc<PlaybackQueue>,
    backend: Arc<dyn AudioBackend>,
    shared: Arc<SharedState>,
    state: Mutex<ControllerState>,
    advancing: AtomicBool,
    skip_requested: Notify,
    toggle_requested: Notify,
}

impl PlaybackController {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        backend: Arc<dyn AudioBackend>,
        shared: Arc<SharedState>,
        ledger: RetentionLedger,
    ) -> Self {
        Self {
            queue,
            backend,
            shared,
            state: Mutex::new(ControllerState {
                now_playing: None,
                ledger,
                generation: 0,
            }),
            advancing: AtomicBool::new(false),
            skip_requested: Notify::new(),
            toggle_requested: Notify::new(),
        }
    }

    /// Move to the next queued track
    ///
    /// Waits for the queue when it is empty. The previous track, if any, is
    /// released from the player and committed to the retention ledger once
    /// the next one is in hand.
    pub async fn advance_to_next(&self) -> AdvanceOutcome {
        if self
            .advancing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Advance already in progress");
            return AdvanceOutcome::Coalesced;
        }
        let _guard = AdvanceGuard(&self.advancing);

        let next = self.queue.pop().await;

        let mut state = self.state.lock().await;
        self.retire_current(&mut state);

        state.generation += 1;
        let generation = state.generation;

        let (media, stalled, outcome) = match self.start(&next).await {
            Ok(media) => {
                info!("Now playing: {} ({})", next.title, next.id);
                self.shared.broadcast_event(SquawkEvent::TrackStarted {
                    request_id: next.request_id,
                    track_id: next.id.to_string(),
                    title: next.title.clone(),
                    timestamp: chrono::Utc::now(),
                });
                (Some(media), false, AdvanceOutcome::Advanced)
            }
            Err(e) => {
                error!("{}; waiting for skip", e);
                self.shared.broadcast_event(SquawkEvent::PlaybackStalled {
                    request_id: next.request_id,
                    track_id: next.id.to_string(),
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                (None, true, AdvanceOutcome::Stalled)
            }
        };

        state.now_playing = Some(NowPlaying {
            track: next,
            media,
            stalled,
            generation,
        });
        outcome
    }

    /// Load and start `track` on the blocking pool; opening and probing the
    /// file is synchronous I/O
    async fn start(&self, track: &TrackRequest) -> Result<MediaHandle> {
        let path = track
            .path()
            .ok_or_else(|| Error::PlaybackLoadFailed {
                path: PathBuf::new(),
                reason: format!("{} has no stored file", track.id),
            })?
            .to_path_buf();

        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || -> Result<MediaHandle> {
            let media = backend.load(&path)?;
            if let Err(e) = backend.play() {
                backend.release(media);
                return Err(e);
            }
            Ok(media)
        })
        .await
        .map_err(|e| Error::AudioOutput(format!("player task failed: {}", e)))?
    }

    fn retire_current(&self, state: &mut ControllerState) {
        let Some(mut previous) = state.now_playing.take() else {
            return;
        };
        if let Some(media) = previous.media.take() {
            self.backend.release(media);
        }

        debug!("Retiring {} ({})", previous.track.title, previous.track.id);
        self.shared.broadcast_event(SquawkEvent::TrackRetired {
            request_id: previous.track.request_id,
            track_id: previous.track.id.to_string(),
            title: previous.track.title.clone(),
            timestamp: chrono::Utc::now(),
        });

        let report = state.ledger.commit(previous.track);
        self.publish_evictions(&report);
    }

    fn publish_evictions(&self, report: &EvictionReport) {
        for evicted in &report.evicted {
            self.shared.broadcast_event(SquawkEvent::FileEvicted {
                request_id: evicted.request_id,
                track_id: evicted.track_id.to_string(),
                path: evicted.path.display().to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Time until the current track ends on its own
    ///
    /// `None` when nothing can end naturally: no track, or a stalled one.
    pub async fn compute_wait_duration(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        let now = state.now_playing.as_ref()?;
        if now.stalled {
            return None;
        }
        Some(remaining_time(
            self.backend.length_ms(),
            self.backend.position(),
            now.track.duration,
            self.backend.played(),
        ))
    }

    /// Explicit skip: advance, then wake the supervisor
    pub async fn skip(&self) -> AdvanceOutcome {
        let outcome = self.advance_to_next().await;
        if outcome != AdvanceOutcome::Coalesced {
            self.skip_requested.notify_one();
        }
        outcome
    }

    /// Pause or resume the player. Returns whether it is playing afterwards.
    pub async fn toggle_pause(&self) -> Result<bool> {
        self.backend.toggle_pause()?;
        let playing = self.backend.is_playing();
        info!("Playback {}", if playing { "resumed" } else { "paused" });

        self.shared.broadcast_event(SquawkEvent::PlaybackToggled {
            playing,
            timestamp: chrono::Utc::now(),
        });
        self.toggle_requested.notify_one();
        Ok(playing)
    }

    pub fn is_playing(&self) -> bool {
        self.backend.is_playing()
    }

    pub fn player_state(&self) -> PlayerState {
        self.backend.state()
    }

    /// Generation of the now-playing track; changes on every advance
    pub async fn current_generation(&self) -> Option<u64> {
        let state = self.state.lock().await;
        state.now_playing.as_ref().map(|n| n.generation)
    }

    pub async fn is_stalled(&self) -> bool {
        let state = self.state.lock().await;
        state.now_playing.as_ref().is_some_and(|n| n.stalled)
    }

    /// Wait for the next explicit skip
    pub async fn skip_requested(&self) {
        self.skip_requested.notified().await
    }

    /// Wait for the next pause toggle
    pub async fn toggle_requested(&self) {
        self.toggle_requested.notified().await
    }

    pub async fn status(&self) -> PlaybackStatus {
        let state = self.state.lock().await;
        let now_playing = state.now_playing.as_ref().map(|now| {
            let elapsed = self.backend.played();
            let remaining = (!now.stalled).then(|| {
                remaining_time(
                    self.backend.length_ms(),
                    self.backend.position(),
                    now.track.duration,
                    elapsed,
                )
            });
            NowPlayingStatus {
                track: now.track.summary(),
                elapsed_ms: elapsed.as_millis() as u64,
                remaining_ms: remaining.map(|r| r.as_millis() as u64),
                stalled: now.stalled,
            }
        });

        PlaybackStatus {
            now_playing,
            playing: self.backend.is_playing(),
            queue: self.queue.snapshot(),
            queue_capacity: self.queue.capacity(),
            recent: state.ledger.entries(STATUS_RECENT),
        }
    }

    /// Most recent ledger entries, newest first
    pub async fn log_entries(&self, limit: usize) -> Vec<TrackSummary> {
        self.state.lock().await.ledger.entries(limit)
    }

    /// Run a ledger maintenance sweep
    pub async fn sweep(&self) -> EvictionReport {
        let report = self.state.lock().await.ledger.sweep();
        self.publish_evictions(&report);
        report
    }

    pub async fn needs_sweep(&self) -> bool {
        self.state.lock().await.ledger.needs_sweep()
    }

    /// Stop output and release the now-playing media
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        self.backend.stop();
        if let Some(media) = state.now_playing.as_mut().and_then(|n| n.media.take()) {
            self.backend.release(media);
        }
        info!("Playback stopped");
    }
}

/// Remaining play time of a track
///
/// Uses the player's length and position when it reports a length, else the
/// known duration minus the time actually played. Unknown length gives zero
/// so the caller falls back to polling.
pub fn remaining_time(
    length_ms: u64,
    position: f32,
    known_duration: Option<Duration>,
    played: Duration,
) -> Duration {
    if length_ms > 0 {
        let left = 1.0 - f64::from(position.clamp(0.0, 1.0));
        return Duration::from_secs_f64(length_ms as f64 / 1000.0 * left);
    }
    known_duration
        .map(|d| d.saturating_sub(played))
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_from_player() {
        let d = remaining_time(200_000, 0.25, None, Duration::ZERO);
        assert_eq!(d.as_millis(), 150_000);

        let d = remaining_time(200_000, 1.0, None, Duration::ZERO);
        assert_eq!(d, Duration::ZERO);
    }

    #[test]
    fn test_remaining_clamps_position() {
        assert_eq!(remaining_time(1000, 1.5, None, Duration::ZERO), Duration::ZERO);
        assert_eq!(remaining_time(1000, -0.5, None, Duration::ZERO).as_millis(), 1000);
    }

    #[test]
    fn test_remaining_falls_back_to_known_duration() {
        let d = remaining_time(
            0,
            0.0,
            Some(Duration::from_secs(180)),
            Duration::from_secs(30),
        );
        assert_eq!(d, Duration::from_secs(150));

        let d = remaining_time(0, 0.0, Some(Duration::from_secs(10)), Duration::from_secs(30));
        assert_eq!(d, Duration::ZERO);
    }

    #[test]
    fn test_remaining_unknown_is_zero() {
        assert_eq!(remaining_time(0, 0.5, None, Duration::from_secs(3)), Duration::ZERO);
    }

    #[test]
    fn test_advance_guard_clears_flag() {
        let flag = AtomicBool::new(true);
        {
            let _guard = AdvanceGuard(&flag);
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
