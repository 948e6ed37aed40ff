//! HTTP request surface
//!
//! Thin translation from inbound requests to the fetch serializer and the
//! playback controller. Long-running work is spawned; handlers answer at once.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
