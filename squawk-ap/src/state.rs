//! Shared service state
//!
//! Thread-safe state shared between the playback components and the HTTP layer.

use squawk_common::events::{EventBus, SquawkEvent};
use tokio::sync::broadcast;

/// Event channel capacity; slow SSE clients lag past this many events
const EVENT_CAPACITY: usize = 100;

/// Shared state accessible by all components
pub struct SharedState {
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self {
            events: EventBus::new(EVENT_CAPACITY),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: SquawkEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<SquawkEvent> {
        self.events.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
