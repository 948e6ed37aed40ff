//! # squawk-ap
//!
//! Network-triggered audio queue player.
//!
//! Callers ask for a track by id over HTTP. Tracks are fetched one at a time
//! by an external tool, queued in a bounded FIFO, and played back to back
//! through the local audio output. Files of played tracks are deleted once
//! they fall outside a retention window.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod playback;
pub mod state;
pub mod track;

pub use error::{Error, Result};
