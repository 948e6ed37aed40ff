//! Audio output abstraction
//!
//! The playback controller drives a player through [`AudioBackend`]; the
//! production implementation is [`output::RodioOutput`].

pub mod output;

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

pub use output::RodioOutput;

/// Handle to media loaded into a player
///
/// Deliberately neither `Clone` nor `Copy`: [`AudioBackend::release`] takes
/// it by value, so each loaded media is released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct MediaHandle(u64);

impl MediaHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// What the loaded media is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing loaded, or the loaded media has played to its end
    Idle,
    Playing,
    /// Paused part way through; resumes where it stopped
    Paused,
}

/// Single-stream audio player
///
/// Players may report a zero length and position for a short while after
/// `play()`; callers are expected to wait a settle delay before trusting them.
pub trait AudioBackend: Send + Sync {
    /// Load a file, replacing whatever was loaded before
    fn load(&self, path: &Path) -> Result<MediaHandle>;

    /// Start (or restart) the loaded media
    fn play(&self) -> Result<()>;

    /// Stop output of the loaded media
    fn stop(&self);

    /// Pause if playing, resume if paused
    fn toggle_pause(&self) -> Result<()>;

    /// Current state, read in one step so a pause is never seen as an end
    fn state(&self) -> PlayerState;

    /// Whether audio is currently being produced
    fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    /// Playback position as a fraction of the length, in `[0.0, 1.0]`
    fn position(&self) -> f32;

    /// Time of the loaded media played so far, not counting pauses
    fn played(&self) -> Duration;

    /// Length of the loaded media in milliseconds, 0 when unknown
    fn length_ms(&self) -> u64;

    /// Release the resources held for `media`
    fn release(&self, media: MediaHandle);
}
