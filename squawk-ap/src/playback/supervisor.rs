//! Background scheduling tasks
//!
//! The supervisor advances playback when a track ends on its own or after an
//! explicit skip. The maintenance task periodically sweeps the retention
//! ledger. Both stop when their cancellation token fires.

use crate::audio::PlayerState;
use crate::playback::controller::PlaybackController;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest wait between end-of-track checks while the player still reports
/// playing
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Spawn the playback supervisor
///
/// `settle_delay` is how long the player gets after starting a track before
/// its length and position are trusted.
pub fn spawn_supervisor(
    controller: Arc<PlaybackController>,
    settle_delay: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Playback supervisor started");
        run_supervisor(&controller, settle_delay, &cancel).await;
        info!("Playback supervisor stopped");
    })
}

async fn run_supervisor(
    controller: &PlaybackController,
    settle_delay: Duration,
    cancel: &CancellationToken,
) {
    let mut last_seen: Option<u64> = None;

    loop {
        let current = controller.current_generation().await;
        if current.is_none() || current == last_seen {
            tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = controller.advance_to_next() => {
                    debug!("Supervisor advance: {:?}", outcome);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(settle_delay) => {}
            }
            continue;
        }

        last_seen = current;
        if !wait_for_track_end(controller, settle_delay, cancel, last_seen).await {
            return;
        }
    }
}

/// What woke the end-of-track wait
enum Wake {
    Deadline,
    Skip,
    Toggle,
}

/// Wait until the track with generation `watching` should be replaced.
/// Returns false when cancelled.
async fn wait_for_track_end(
    controller: &PlaybackController,
    settle_delay: Duration,
    cancel: &CancellationToken,
    watching: Option<u64>,
) -> bool {
    loop {
        let wait = controller
            .compute_wait_duration()
            .await
            .map(|w| w.max(POLL_INTERVAL));

        let wake = tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = sleep_or_forever(wait) => Wake::Deadline,
            _ = controller.skip_requested() => Wake::Skip,
            _ = controller.toggle_requested() => Wake::Toggle,
        };

        let verdict = match wake {
            Wake::Deadline => match controller.player_state() {
                PlayerState::Idle => {
                    debug!("Track finished");
                    return true;
                }
                // The pause may have beaten its toggle signal to this deadline
                PlayerState::Paused => {
                    hold_while_paused(controller, settle_delay, cancel, watching).await
                }
                PlayerState::Playing => None,
            },
            Wake::Skip => after_skip(controller, settle_delay, cancel, watching).await,
            Wake::Toggle => hold_while_paused(controller, settle_delay, cancel, watching).await,
        };
        if let Some(done) = verdict {
            return done;
        }
    }
}

/// Wait out a pause of any length. `Some(done)` ends the wait for
/// `watching`; `None` means playback resumed.
async fn hold_while_paused(
    controller: &PlaybackController,
    settle_delay: Duration,
    cancel: &CancellationToken,
    watching: Option<u64>,
) -> Option<bool> {
    while controller.player_state() == PlayerState::Paused {
        debug!("Paused; waiting for resume");
        let skipped = tokio::select! {
            _ = cancel.cancelled() => return Some(false),
            _ = controller.toggle_requested() => false,
            _ = controller.skip_requested() => true,
        };
        if skipped {
            if let Some(done) = after_skip(controller, settle_delay, cancel, watching).await {
                return Some(done);
            }
        }
    }
    None
}

/// Settle after a skip signal. `Some(done)` ends the wait for `watching`;
/// `None` means the signal was stale and waiting continues.
async fn after_skip(
    controller: &PlaybackController,
    settle_delay: Duration,
    cancel: &CancellationToken,
    watching: Option<u64>,
) -> Option<bool> {
    tokio::select! {
        _ = cancel.cancelled() => return Some(false),
        _ = tokio::time::sleep(settle_delay) => {}
    }
    // A skip always advances first; an unchanged generation means the signal
    // was left over from an earlier skip
    (controller.current_generation().await != watching).then_some(true)
}

async fn sleep_or_forever(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => pending().await,
    }
}

/// Spawn the ledger maintenance task, sweeping every `interval`
pub fn spawn_maintenance(
    controller: Arc<PlaybackController>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let dirty = controller.needs_sweep().await;
                    let report = controller.sweep().await;
                    debug!(
                        "Maintenance sweep: {} evicted, {} failed (dirty before: {})",
                        report.evicted.len(),
                        report.failed.len(),
                        dirty
                    );
                }
            }
        }
        debug!("Maintenance task stopped");
    })
}
