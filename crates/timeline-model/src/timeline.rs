//! Clips, audio tracks, and the compiled timeline.
//!
//! A [`Timeline`] is built once per render request and is read-only
//! afterwards: its fields are private and only exposed through getters.

use std::path::PathBuf;

use reelweave_common::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};

use crate::layer::{
    FillColorLayer, ImageOverlayLayer, Layer, MainVideoLayer, TransitionOverlayLayer,
};

/// Tolerance when comparing overlay windows against clip durations.
const WINDOW_EPSILON: f64 = 1e-6;

/// An ordered stack of layers with a derived duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Explicit duration in seconds. Required for fill-color clips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    pub layers: Vec<Layer>,
}

/// Borrowed view of a clip's content layer.
#[derive(Debug, Clone, Copy)]
pub enum ContentLayer<'a> {
    Video(&'a MainVideoLayer),
    Fill(&'a FillColorLayer),
}

/// Audio placed on the whole-timeline axis, independent of any clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub path: PathBuf,

    #[serde(default)]
    pub cut_from: f64,

    pub cut_to: f64,

    /// Position on the timeline where playback starts (seconds).
    #[serde(rename = "start")]
    pub global_start: f64,

    #[serde(default = "default_mix_volume")]
    pub mix_volume: f64,
}

/// Output parameters shared by both emitters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    #[serde(default = "default_keep_source_audio")]
    pub keep_source_audio: bool,
}

/// Fully resolved clip sequence plus global audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    #[serde(flatten)]
    params: RenderParams,

    clips: Vec<Clip>,

    #[serde(default)]
    audio_tracks: Vec<AudioTrack>,
}

fn default_mix_volume() -> f64 {
    1.0
}

fn default_keep_source_audio() -> bool {
    true
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            keep_source_audio: true,
        }
    }
}

impl Clip {
    /// A clip whose duration derives from its content layer.
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            duration: None,
            layers,
        }
    }

    pub fn with_duration(duration: f64, layers: Vec<Layer>) -> Self {
        Self {
            duration: Some(duration),
            layers,
        }
    }

    /// Explicit duration if given, otherwise the content layer's cut range.
    pub fn duration(&self) -> f64 {
        if let Some(duration) = self.duration {
            return duration.max(0.0);
        }
        match self.content() {
            Some(ContentLayer::Video(video)) => video.duration(),
            _ => 0.0,
        }
    }

    /// The first content layer. Use [`Clip::validate`] to reject clips
    /// with more than one.
    pub fn content(&self) -> Option<ContentLayer<'_>> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::MainVideo(video) => Some(ContentLayer::Video(video)),
            Layer::FillColor(fill) => Some(ContentLayer::Fill(fill)),
            _ => None,
        })
    }

    pub fn main_video(&self) -> Option<&MainVideoLayer> {
        match self.content() {
            Some(ContentLayer::Video(video)) => Some(video),
            _ => None,
        }
    }

    pub fn image_overlays(&self) -> impl Iterator<Item = &ImageOverlayLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::ImageOverlay(overlay) => Some(overlay),
            _ => None,
        })
    }

    pub fn transition_overlays(&self) -> impl Iterator<Item = &TransitionOverlayLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::TransitionOverlay(overlay) => Some(overlay),
            _ => None,
        })
    }

    /// Whether this clip is a fill-color filler.
    pub fn is_filler(&self) -> bool {
        matches!(self.content(), Some(ContentLayer::Fill(_)))
    }

    pub fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Insert a transition overlay ahead of any existing transition
    /// overlays, keeping content and image layers underneath it.
    pub fn prepend_transition(&mut self, overlay: TransitionOverlayLayer) {
        let index = self
            .layers
            .iter()
            .position(|layer| matches!(layer, Layer::TransitionOverlay(_)))
            .unwrap_or(self.layers.len());
        self.layers.insert(index, Layer::TransitionOverlay(overlay));
    }

    /// Check the structural invariants of a single clip.
    pub fn validate(&self) -> RenderResult<()> {
        let content_layers = self.layers.iter().filter(|layer| layer.is_content()).count();
        if content_layers > 1 {
            return Err(RenderError::graph_build(format!(
                "clip has {content_layers} content layers, expected at most one"
            )));
        }

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(RenderError::graph_build(format!(
                    "clip has invalid explicit duration {duration}"
                )));
            }
        }

        match self.content() {
            Some(ContentLayer::Video(video)) => {
                if !(video.cut_from >= 0.0 && video.cut_to > video.cut_from) {
                    return Err(RenderError::graph_build(format!(
                        "video layer {} has empty cut range [{}, {})",
                        video.path.display(),
                        video.cut_from,
                        video.cut_to
                    )));
                }
            }
            Some(ContentLayer::Fill(_)) | None => {
                if self.duration.is_none() {
                    return Err(RenderError::graph_build(
                        "clip without a video layer needs an explicit duration",
                    ));
                }
            }
        }

        let duration = self.duration();
        for overlay in self.transition_overlays() {
            let window_ok = overlay.window_start >= -WINDOW_EPSILON
                && overlay.window_stop > overlay.window_start
                && overlay.window_stop <= duration + WINDOW_EPSILON;
            let source_ok =
                overlay.source_cut_from >= 0.0 && overlay.source_cut_to > overlay.source_cut_from;
            if !window_ok || !source_ok {
                return Err(RenderError::graph_build(format!(
                    "transition overlay window [{}, {}) source [{}, {}) does not fit a {}s clip",
                    overlay.window_start,
                    overlay.window_stop,
                    overlay.source_cut_from,
                    overlay.source_cut_to,
                    duration
                )));
            }
        }

        Ok(())
    }
}

impl AudioTrack {
    pub fn duration(&self) -> f64 {
        (self.cut_to - self.cut_from).max(0.0)
    }

    pub fn global_end(&self) -> f64 {
        self.global_start + self.duration()
    }
}

impl Timeline {
    /// Assemble and validate a timeline.
    pub fn new(
        params: RenderParams,
        clips: Vec<Clip>,
        audio_tracks: Vec<AudioTrack>,
    ) -> RenderResult<Self> {
        let timeline = Self {
            params,
            clips,
            audio_tracks,
        };
        timeline.validate()?;
        Ok(timeline)
    }

    /// Check every invariant. Emitters call this on timelines that were
    /// deserialized rather than built through [`Timeline::new`].
    pub fn validate(&self) -> RenderResult<()> {
        if self.clips.is_empty() {
            return Err(RenderError::EmptySelection);
        }
        if self.params.fps == 0 || self.params.width == 0 || self.params.height == 0 {
            return Err(RenderError::graph_build(format!(
                "invalid render parameters {}x{} @ {} fps",
                self.params.width, self.params.height, self.params.fps
            )));
        }
        for (index, clip) in self.clips.iter().enumerate() {
            clip.validate().map_err(|err| match err {
                RenderError::GraphBuild { message } => {
                    RenderError::graph_build(format!("clip {index}: {message}"))
                }
                other => other,
            })?;
        }
        for track in &self.audio_tracks {
            if track.global_start < 0.0 || track.cut_to <= track.cut_from || track.mix_volume < 0.0 {
                return Err(RenderError::graph_build(format!(
                    "audio track {} has invalid placement (start {}, cut [{}, {}), volume {})",
                    track.path.display(),
                    track.global_start,
                    track.cut_from,
                    track.cut_to,
                    track.mix_volume
                )));
            }
        }
        Ok(())
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn width(&self) -> u32 {
        self.params.width
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }

    pub fn fps(&self) -> u32 {
        self.params.fps
    }

    pub fn keep_source_audio(&self) -> bool {
        self.params.keep_source_audio
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio_tracks
    }

    /// Sum of all clip durations (seconds).
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(Clip::duration).sum()
    }

    /// Start time of every clip on the timeline axis.
    pub fn clip_start_times(&self) -> Vec<f64> {
        self.clips
            .iter()
            .scan(0.0, |cursor, clip| {
                let start = *cursor;
                *cursor += clip.duration();
                Some(start)
            })
            .collect()
    }

    /// Every distinct asset path, in first-reference order.
    pub fn asset_paths(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        self.clips
            .iter()
            .flat_map(|clip| clip.layers.iter().filter_map(Layer::asset_path))
            .chain(self.audio_tracks.iter().map(|track| track.path.as_path()))
            .filter(|path| seen.insert(path.to_path_buf()))
            .map(|path| path.to_path_buf())
            .collect()
    }
}
