//! Event types for the squawk event system
//!
//! Provides the shared event enum and the broadcast EventBus used by the
//! playback engine and the SSE endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Squawk event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// `request_id` identifies a single add-request; the same `track_id` may be
/// requested more than once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SquawkEvent {
    /// Track fetched and appended to the playback queue
    TrackQueued {
        request_id: Uuid,
        track_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// External fetch failed; the request was dropped
    FetchFailed {
        request_id: Uuid,
        track_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Track loaded and started playing
    TrackStarted {
        request_id: Uuid,
        track_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// Player rejected the track; playback waits for an explicit skip
    PlaybackStalled {
        request_id: Uuid,
        track_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Track finished or was skipped and moved into the retention ledger
    TrackRetired {
        request_id: Uuid,
        track_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// Audio file removed after leaving the retention window
    FileEvicted {
        request_id: Uuid,
        track_id: String,
        path: String,
        timestamp: DateTime<Utc>,
    },

    /// Pause state toggled
    PlaybackToggled {
        /// Whether the player reports playing after the toggle
        playing: bool,
        timestamp: DateTime<Utc>,
    },
}

impl SquawkEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SquawkEvent::TrackQueued { .. } => "TrackQueued",
            SquawkEvent::FetchFailed { .. } => "FetchFailed",
            SquawkEvent::TrackStarted { .. } => "TrackStarted",
            SquawkEvent::PlaybackStalled { .. } => "PlaybackStalled",
            SquawkEvent::TrackRetired { .. } => "TrackRetired",
            SquawkEvent::FileEvicted { .. } => "FileEvicted",
            SquawkEvent::PlaybackToggled { .. } => "PlaybackToggled",
        }
    }
}

/// Broadcast bus for SquawkEvent
///
/// Slow subscribers lag and lose the oldest events; publishers never block.
pub struct EventBus {
    tx: broadcast::Sender<SquawkEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SquawkEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SquawkEvent,
    ) -> Result<usize, broadcast::error::SendError<SquawkEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SquawkEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
