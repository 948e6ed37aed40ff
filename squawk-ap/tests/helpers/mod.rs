//! Shared fakes for integration tests
//!
//! `FakeBackend` simulates a player against the wall clock; `StubFetcher`
//! writes placeholder files and records how many fetches overlap.

#![allow(dead_code)]

use async_trait::async_trait;
use squawk_ap::api::AppContext;
use squawk_ap::audio::{AudioBackend, MediaHandle, PlayerState};
use squawk_ap::error::{Error, Result};
use squawk_ap::fetcher::{Fetcher, TrackInfo};
use squawk_ap::playback::{FetchSerializer, PlaybackController, PlaybackQueue, RetentionLedger};
use squawk_ap::state::SharedState;
use squawk_ap::track::{TrackId, TrackRequest};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ============================================================================
// Fake player
// ============================================================================

#[derive(Default)]
struct FakePlayer {
    loaded: Option<(u64, PathBuf)>,
    played: Duration,
    resumed_at: Option<Instant>,
    next_id: u64,
    started: Vec<PathBuf>,
    released: Vec<u64>,
}

impl FakePlayer {
    fn elapsed(&self) -> Duration {
        self.played + self.resumed_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Player whose tracks all last `length`, with optional per-file load failures
pub struct FakeBackend {
    length: Duration,
    length_known: AtomicBool,
    load_delay: Mutex<Duration>,
    state: Mutex<FakePlayer>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl FakeBackend {
    pub fn new(length: Duration) -> Self {
        Self {
            length,
            length_known: AtomicBool::new(true),
            load_delay: Mutex::new(Duration::ZERO),
            state: Mutex::new(FakePlayer::default()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make `load` fail for `path`
    pub fn fail_loads_for(&self, path: PathBuf) {
        self.failing.lock().unwrap().insert(path);
    }

    /// Report a zero length, like a player that cannot size the stream
    pub fn hide_length(&self) {
        self.length_known.store(false, Ordering::SeqCst);
    }

    /// Block the calling thread for `delay` on every load
    pub fn slow_loads(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    /// Pause the player directly, without the controller's toggle signal
    pub fn pause_silently(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(t) = state.resumed_at.take() {
            state.played += t.elapsed();
        }
    }

    /// Files that were loaded and started, in order
    pub fn started(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn started_count(&self) -> usize {
        self.state.lock().unwrap().started.len()
    }

    /// Media ids passed to `release`, in order
    pub fn released(&self) -> Vec<u64> {
        self.state.lock().unwrap().released.clone()
    }
}

impl AudioBackend for FakeBackend {
    fn load(&self, path: &Path) -> Result<MediaHandle> {
        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.failing.lock().unwrap().contains(path) {
            return Err(Error::PlaybackLoadFailed {
                path: path.to_path_buf(),
                reason: "unsupported format".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.loaded = Some((id, path.to_path_buf()));
        state.played = Duration::ZERO;
        state.resumed_at = None;
        Ok(MediaHandle::new(id))
    }

    fn play(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some((_, path)) = state.loaded.clone() else {
            return Err(Error::AudioOutput("nothing loaded".to_string()));
        };
        state.played = Duration::ZERO;
        state.resumed_at = Some(Instant::now());
        state.started.push(path);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.loaded = None;
        state.resumed_at = None;
    }

    fn toggle_pause(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.loaded.is_none() {
            return Ok(());
        }
        match state.resumed_at.take() {
            Some(t) => state.played += t.elapsed(),
            None => state.resumed_at = Some(Instant::now()),
        }
        Ok(())
    }

    fn state(&self) -> PlayerState {
        let state = self.state.lock().unwrap();
        if state.loaded.is_none() || state.elapsed() >= self.length {
            PlayerState::Idle
        } else if state.resumed_at.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        }
    }

    fn position(&self) -> f32 {
        let state = self.state.lock().unwrap();
        if state.loaded.is_none() || !self.length_known.load(Ordering::SeqCst) {
            return 0.0;
        }
        (state.elapsed().as_secs_f32() / self.length.as_secs_f32()).min(1.0)
    }

    fn played(&self) -> Duration {
        let state = self.state.lock().unwrap();
        if state.loaded.is_none() {
            return Duration::ZERO;
        }
        state.elapsed().min(self.length)
    }

    fn length_ms(&self) -> u64 {
        let state = self.state.lock().unwrap();
        if state.loaded.is_some() && self.length_known.load(Ordering::SeqCst) {
            self.length.as_millis() as u64
        } else {
            0
        }
    }

    fn release(&self, media: MediaHandle) {
        let mut state = self.state.lock().unwrap();
        if state.loaded.as_ref().is_some_and(|(id, _)| *id == media.id()) {
            state.loaded = None;
            state.resumed_at = None;
        }
        state.released.push(media.id());
    }
}

// ============================================================================
// Fake fetch tool
// ============================================================================

/// Fetcher that writes `<stem>.ogg` after `delay`
pub struct StubFetcher {
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Fail fetches of `id`, leaving a partial file behind
    pub fn fail_id(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    /// Highest number of fetches ever running at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Ids of successful fetches in completion order
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn describe(&self, id: &TrackId) -> Result<TrackInfo> {
        Ok(TrackInfo {
            title: format!("Title of {}", id),
            duration: None,
        })
    }

    async fn fetch(&self, id: &TrackId, stem: &str, dir: &Path) -> Result<PathBuf> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(id.as_str()) {
            std::fs::write(dir.join(format!("{}.webm.part", stem)), b"partial")?;
            return Err(Error::FetchFailed {
                id: id.to_string(),
                reason: "tool exited with exit status: 1".to_string(),
            });
        }

        let path = dir.join(format!("{}.ogg", stem));
        std::fs::write(&path, b"audio")?;
        self.completed.lock().unwrap().push(id.to_string());
        Ok(path)
    }
}

// ============================================================================
// Assembled pipeline
// ============================================================================

pub struct TestPipeline {
    pub dir: TempDir,
    pub shared: Arc<SharedState>,
    pub queue: Arc<PlaybackQueue>,
    pub backend: Arc<FakeBackend>,
    pub fetcher: Arc<StubFetcher>,
    pub controller: Arc<PlaybackController>,
    pub fetch: Arc<FetchSerializer>,
}

pub struct PipelineOptions {
    pub queue_size: usize,
    pub log_size: usize,
    pub num_files: usize,
    pub track_length: Duration,
    pub fetch_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_size: 2,
            log_size: 25,
            num_files: 5,
            track_length: Duration::from_secs(60),
            fetch_delay: Duration::from_millis(10),
        }
    }
}

impl TestPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let dir = TempDir::new().unwrap();
        let shared = Arc::new(SharedState::new());
        let queue = Arc::new(PlaybackQueue::new(options.queue_size));
        let backend = Arc::new(FakeBackend::new(options.track_length));
        let fetcher = Arc::new(StubFetcher::new(options.fetch_delay));

        let controller = Arc::new(PlaybackController::new(
            Arc::clone(&queue),
            backend.clone(),
            Arc::clone(&shared),
            RetentionLedger::new(options.log_size, options.num_files),
        ));
        let fetch = Arc::new(FetchSerializer::new(
            fetcher.clone(),
            Arc::clone(&queue),
            Arc::clone(&shared),
            dir.path().to_path_buf(),
        ));

        Self {
            dir,
            shared,
            queue,
            backend,
            fetcher,
            controller,
            fetch,
        }
    }

    pub fn app_context(&self) -> AppContext {
        AppContext {
            state: Arc::clone(&self.shared),
            controller: Arc::clone(&self.controller),
            fetch: Arc::clone(&self.fetch),
        }
    }

    /// Files currently in the storage directory
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    /// Push an already-fetched track straight onto the queue
    pub async fn enqueue_stored(&self, raw_id: &str) -> PathBuf {
        self.enqueue_stored_with_duration(raw_id, None).await
    }

    /// Like `enqueue_stored`, with the length the fetch tool reported
    pub async fn enqueue_stored_with_duration(
        &self,
        raw_id: &str,
        duration: Option<Duration>,
    ) -> PathBuf {
        let mut track = create_test_request(raw_id);
        track.duration = duration;
        let path = self
            .dir
            .path()
            .join(format!("{}.{}.ogg", raw_id, track.request_id.simple()));
        std::fs::write(&path, b"audio").unwrap();
        track.mark_stored(path.clone());
        self.queue.push(track).await;
        path
    }
}

pub fn create_test_request(raw_id: &str) -> TrackRequest {
    TrackRequest::new(TrackId::parse(raw_id).unwrap())
}

/// Poll `check` every 10ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
