//! Bounded FIFO of fetched tracks awaiting playback
//!
//! Two counting semaphores track free slots and ready items. Producers block
//! when the queue is full and are served in arrival order; nothing is dropped.

use crate::track::{TrackRequest, TrackSummary};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Bounded playback queue
pub struct PlaybackQueue {
    items: Mutex<VecDeque<TrackRequest>>,
    free: Semaphore,
    ready: Semaphore,
    capacity: usize,
}

impl PlaybackQueue {
    /// Create a queue holding at most `capacity` tracks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            free: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<TrackRequest>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a track, waiting for a free slot if the queue is full
    pub async fn push(&self, track: TrackRequest) {
        // Semaphores are never closed, so acquire only fails on shutdown races
        if let Ok(permit) = self.free.acquire().await {
            permit.forget();
        }
        self.items().push_back(track);
        self.ready.add_permits(1);
    }

    /// Remove the oldest track, waiting until one is available
    ///
    /// Cancel-safe: a cancelled `pop` removes nothing.
    pub async fn pop(&self) -> TrackRequest {
        loop {
            if let Ok(permit) = self.ready.acquire().await {
                permit.forget();
            }
            if let Some(track) = self.items().pop_front() {
                self.free.add_permits(1);
                return track;
            }
        }
    }

    /// Remove the oldest track without waiting
    pub fn try_pop(&self) -> Option<TrackRequest> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        let track = self.items().pop_front()?;
        self.free.add_permits(1);
        Some(track)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued tracks in play order
    pub fn snapshot(&self) -> Vec<TrackSummary> {
        self.items().iter().map(TrackRequest::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackId;
    use std::sync::Arc;
    use std::time::Duration;

    fn create_test_track(id: &str) -> TrackRequest {
        TrackRequest::new(TrackId::parse(id).unwrap())
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = PlaybackQueue::new(3);
        queue.push(create_test_track("aaaaaaaaaaa")).await;
        queue.push(create_test_track("bbbbbbbbbbb")).await;
        queue.push(create_test_track("ccccccccccc")).await;

        assert_eq!(queue.len(), 3);
        let ids: Vec<String> = queue.snapshot().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);

        assert_eq!(queue.pop().await.id.as_str(), "aaaaaaaaaaa");
        assert_eq!(queue.pop().await.id.as_str(), "bbbbbbbbbbb");
        assert_eq!(queue.pop().await.id.as_str(), "ccccccccccc");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let queue = Arc::new(PlaybackQueue::new(2));
        queue.push(create_test_track("aaaaaaaaaaa")).await;
        queue.push(create_test_track("bbbbbbbbbbb")).await;

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.push(create_test_track("ccccccccccc")).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished(), "third push should wait for a free slot");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await.id.as_str(), "aaaaaaaaaaa");
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("push should complete after a pop")
            .unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().await.id.as_str(), "bbbbbbbbbbb");
        assert_eq!(queue.pop().await.id.as_str(), "ccccccccccc");
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(PlaybackQueue::new(1));

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push(create_test_track("aaaaaaaaaaa")).await;
        let track = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(track.id.as_str(), "aaaaaaaaaaa");
    }

    #[tokio::test]
    async fn test_cancelled_pop_loses_nothing() {
        let queue = PlaybackQueue::new(1);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), queue.pop()).await;
        assert!(timed_out.is_err());

        queue.push(create_test_track("aaaaaaaaaaa")).await;
        assert_eq!(queue.try_pop().unwrap().id.as_str(), "aaaaaaaaaaa");
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(PlaybackQueue::new(0).capacity(), 1);
    }
}
