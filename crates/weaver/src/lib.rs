//! Reelweave Weaver
//!
//! Turns an ordered clip selection and a channel configuration into a
//! fully resolved [`Timeline`](reelweave_timeline_model::Timeline):
//! - **Main clips:** each source with contain-blur fitting and the channel logo
//! - **Transition partition:** one transition asset split into pre-roll,
//!   gap, and post-roll overlays around every clip boundary
//! - **Transition audio:** one full-length audio track per boundary
//!
//! This crate is pure computation: no I/O, no process access.
//! All inputs are data; all outputs are data.

pub mod partition;
pub mod weave;

pub use partition::TransitionPartition;
pub use weave::{TransitionAsset, TransitionWeaver, WeaverConfig};
