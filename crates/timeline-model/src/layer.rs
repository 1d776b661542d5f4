//! Layer types stacked inside a clip.
//!
//! A clip is drawn bottom-up: its content layer (source video or a solid
//! fill), then image overlays (the channel logo), then transition overlays
//! appended by the weaver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single layer. Serialized with a `"type"` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Layer {
    /// Source footage; the clip's content layer.
    #[serde(rename = "video")]
    MainVideo(MainVideoLayer),

    /// Solid color; the content layer of gap fillers.
    FillColor(FillColorLayer),

    /// Still image composited over the whole frame.
    ImageOverlay(ImageOverlayLayer),

    /// A time-windowed slice of the transition asset.
    TransitionOverlay(TransitionOverlayLayer),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainVideoLayer {
    pub path: PathBuf,

    /// Source in-point (seconds).
    #[serde(default)]
    pub cut_from: f64,

    /// Source out-point (seconds, exclusive).
    pub cut_to: f64,

    #[serde(default)]
    pub resize_mode: ResizeMode,

    /// Background blur strength. Values in `[0, 1]` are a fraction of the
    /// maximum radius; larger values are an absolute radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
}

/// How source footage is fitted to the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Scale to fill, then center-crop.
    Crop,
    /// Aspect-preserving foreground centered over a blurred, cropped
    /// copy of itself.
    #[default]
    ContainBlur,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillColorLayer {
    /// `#RRGGBB`.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlayLayer {
    pub path: PathBuf,

    #[serde(default)]
    pub position: OverlayPosition,
}

/// Anchor of an image overlay inside the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A slice `[source_cut_from, source_cut_to)` of the transition asset,
/// shown during `[window_start, window_stop)` of the owning clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOverlayLayer {
    pub path: PathBuf,
    pub window_start: f64,
    pub window_stop: f64,
    pub source_cut_from: f64,
    pub source_cut_to: f64,
    pub role: TransitionRole,
}

/// Which part of a transition partition an overlay carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionRole {
    /// Tail of the outgoing clip.
    PreRoll,
    /// Inside the filler clip between two main clips.
    Gap,
    /// Head of the incoming clip.
    PostRoll,
}

impl MainVideoLayer {
    pub fn duration(&self) -> f64 {
        (self.cut_to - self.cut_from).max(0.0)
    }
}

impl TransitionOverlayLayer {
    pub fn window_duration(&self) -> f64 {
        (self.window_stop - self.window_start).max(0.0)
    }

    pub fn source_duration(&self) -> f64 {
        (self.source_cut_to - self.source_cut_from).max(0.0)
    }
}

impl Layer {
    /// Content layers define what a clip shows before overlays.
    pub fn is_content(&self) -> bool {
        matches!(self, Layer::MainVideo(_) | Layer::FillColor(_))
    }

    /// Asset path referenced by this layer, if any.
    pub fn asset_path(&self) -> Option<&std::path::Path> {
        match self {
            Layer::MainVideo(layer) => Some(&layer.path),
            Layer::FillColor(_) => None,
            Layer::ImageOverlay(layer) => Some(&layer.path),
            Layer::TransitionOverlay(layer) => Some(&layer.path),
        }
    }
}
