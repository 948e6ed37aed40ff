//! Playback engine
//!
//! Fetched tracks flow through the fetch serializer into the bounded queue;
//! the controller moves them into the player and from there into the
//! retention ledger, driven by the supervisor task.

pub mod controller;
pub mod fetch;
pub mod ledger;
pub mod queue;
pub mod supervisor;

pub use controller::{AdvanceOutcome, PlaybackController, PlaybackStatus};
pub use fetch::FetchSerializer;
pub use ledger::{EvictionReport, RetentionLedger};
pub use queue::PlaybackQueue;
pub use supervisor::{spawn_maintenance, spawn_supervisor};
