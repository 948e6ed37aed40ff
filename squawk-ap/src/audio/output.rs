//! rodio-backed audio output
//!
//! The cpal output stream is owned by a dedicated thread for the lifetime of
//! the [`RodioOutput`]; each loaded track gets its own `Sink` on the stream's
//! mixer.

use super::{AudioBackend, MediaHandle, PlayerState};
use crate::error::{Error, Result};
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

struct LoadedMedia {
    id: u64,
    sink: Sink,
    length: Option<Duration>,
}

/// Audio output on the default device
pub struct RodioOutput {
    mixer: Mixer,
    current: Mutex<Option<LoadedMedia>>,
    next_id: AtomicU64,
    /// Dropping this ends the stream thread
    _stream_guard: mpsc::Sender<()>,
}

impl RodioOutput {
    /// Open the default output device
    pub fn open_default() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<Mixer, String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    // rodio logs to stderr when the stream drops
                    stream.log_on_drop(false);
                    let _ = ready_tx.send(Ok(stream.mixer().clone()));
                    // Returns once the sender side is dropped
                    let _ = stop_rx.recv();
                    debug!("Audio output stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("audio thread exited during startup".to_string()))?
            .map_err(Error::AudioOutput)?;

        info!("Opened default audio output device");

        Ok(Self {
            mixer,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            _stream_guard: stop_tx,
        })
    }

    fn current(&self) -> MutexGuard<'_, Option<LoadedMedia>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioBackend for RodioOutput {
    fn load(&self, path: &Path) -> Result<MediaHandle> {
        let load_failed = |reason: String| Error::PlaybackLoadFailed {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_failed(e.to_string()))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| load_failed(e.to_string()))?;
        let length = source.total_duration();

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.append(source);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.current().replace(LoadedMedia { id, sink, length }) {
            warn!("Media {} replaced without release", previous.id);
            previous.sink.stop();
        }

        debug!("Loaded {} as media {} (length {:?})", path.display(), id, length);
        Ok(MediaHandle::new(id))
    }

    fn play(&self) -> Result<()> {
        match self.current().as_ref() {
            Some(media) => {
                media.sink.play();
                Ok(())
            }
            None => Err(Error::AudioOutput("no media loaded".to_string())),
        }
    }

    fn stop(&self) {
        if let Some(media) = self.current().as_ref() {
            media.sink.stop();
        }
    }

    fn toggle_pause(&self) -> Result<()> {
        match self.current().as_ref() {
            Some(media) => {
                if media.sink.is_paused() {
                    media.sink.play();
                } else {
                    media.sink.pause();
                }
            }
            None => debug!("Toggle ignored, no media loaded"),
        }
        Ok(())
    }

    fn state(&self) -> PlayerState {
        match self.current().as_ref() {
            Some(media) if media.sink.empty() => PlayerState::Idle,
            Some(media) if media.sink.is_paused() => PlayerState::Paused,
            Some(_) => PlayerState::Playing,
            None => PlayerState::Idle,
        }
    }

    fn position(&self) -> f32 {
        match self.current().as_ref() {
            Some(LoadedMedia { sink, length: Some(length), .. }) if !length.is_zero() => {
                (sink.get_pos().as_secs_f32() / length.as_secs_f32()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    fn played(&self) -> Duration {
        self.current()
            .as_ref()
            .map(|media| media.sink.get_pos())
            .unwrap_or_default()
    }

    fn length_ms(&self) -> u64 {
        self.current()
            .as_ref()
            .and_then(|media| media.length)
            .map(|length| length.as_millis() as u64)
            .unwrap_or(0)
    }

    fn release(&self, media: MediaHandle) {
        let mut current = self.current();
        if current.as_ref().map(|m| m.id) == Some(media.id()) {
            if let Some(loaded) = current.take() {
                loaded.sink.stop();
                debug!("Released media {}", loaded.id);
            }
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        if let Some(media) = self.current().take() {
            media.sink.stop();
        }
    }
}
