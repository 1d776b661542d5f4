//! Reelweave Render Engine
//!
//! Lowers a compiled [`Timeline`](reelweave_timeline_model::timeline::Timeline)
//! into the two artifacts the pipeline produces: an ffmpeg render plan and
//! an XMEML interchange document for manual finishing in an NLE.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Timeline ──┬── FilterGraphEmitter ── RenderPlan ── ProcessRunner ── output.mp4
//!            │        │
//!            │        ├── ≤ threshold clips: one filter_complex
//!            │        └──  > threshold clips: clip_0000.mp4 … ─ concat ─ audio mix
//!            │
//!            └── XmemlEmitter (+ MediaCatalog) ── sequence.xml
//! ```
//!
//! Compilation is pure; only [`runner`], [`probe`], and [`render`] touch
//! processes or the filesystem.

pub mod encode;
pub mod filtergraph;
pub mod probe;
pub mod render;
pub mod runner;
pub mod xml;
pub mod xmeml;

pub use encode::EncoderSettings;
pub use filtergraph::{
    select_strategy, BatchFinish, BatchPlan, FfmpegInvocation, FilterGraphConfig,
    FilterGraphEmitter, MediaInput, RenderPlan, RenderStrategy, DEFAULT_BATCH_THRESHOLD,
};
pub use probe::FfprobeProbe;
pub use render::{
    execute_plan, render_blocking, render_timeline, ProgressCallback, RenderJob, RenderProgress,
    RenderStage,
};
pub use runner::{command_exists, FfmpegRunner, ProcessProgress, ProcessRunner};
pub use xmeml::{encode_pathurl, XmemlEmitter};
