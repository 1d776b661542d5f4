//! Reelweave Timeline Model
//!
//! Defines the data contracts of the timeline compiler:
//! - **Layers and clips:** content, logo, and transition-overlay layers
//! - **Timeline:** the immutable, fully resolved clip sequence plus audio tracks
//! - **Channels:** per-channel configuration and asset resolution
//! - **Render spec:** the JSON form of a timeline handed to renderers
//! - **History:** render history, the used-clip ledger, and clip selection
//!
//! All times are seconds on `f64`; emitters quantize to frames at the
//! timeline frame rate.

pub mod builder;
pub mod channel;
pub mod error;
pub mod history;
pub mod layer;
pub mod media;
pub mod selection;
pub mod spec;
pub mod timeline;

pub use builder::*;
pub use channel::*;
pub use error::*;
pub use layer::*;
pub use media::*;
pub use spec::*;
pub use timeline::*;
