//! Reelweave Common Utilities
//!
//! Shared infrastructure for all Reelweave crates:
//! - Error taxonomy and result alias
//! - Timecode, frame, and tick arithmetic
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
