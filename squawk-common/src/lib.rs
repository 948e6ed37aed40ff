//! # Squawk Common Library
//!
//! Shared code for the squawk service crates:
//! - Event types (SquawkEvent enum) and the broadcast EventBus
//! - Configuration file discovery and TOML loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
