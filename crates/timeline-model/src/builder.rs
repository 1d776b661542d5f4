//! Construction of main and gap clips.
//!
//! Pure functions over already-probed metadata; no file or process access.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layer::{
    FillColorLayer, ImageOverlayLayer, Layer, MainVideoLayer, OverlayPosition, ResizeMode,
};
use crate::timeline::Clip;

/// Color of gap fillers.
pub const GAP_FILL_COLOR: &str = "#000000";

/// A selected source file with its probed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceClip {
    pub path: PathBuf,
    pub duration: f64,
}

impl SourceClip {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }
}

/// Full-frame logo layer.
pub fn logo_layer(logo_path: &Path) -> Layer {
    Layer::ImageOverlay(ImageOverlayLayer {
        path: logo_path.to_path_buf(),
        position: OverlayPosition::Center,
    })
}

/// The whole source, contain-blur fitted, with the channel logo on top.
/// A non-positive `blur` leaves the layer's blur unset.
pub fn build_main_clip(source: &SourceClip, logo_path: &Path, blur: f64) -> Clip {
    let video = Layer::MainVideo(MainVideoLayer {
        path: source.path.clone(),
        cut_from: 0.0,
        cut_to: source.duration,
        resize_mode: ResizeMode::ContainBlur,
        blur: (blur > 0.0).then_some(blur),
    });
    Clip::new(vec![video, logo_layer(logo_path)])
}

/// A black filler of explicit `duration`, with the channel logo on top.
pub fn build_gap_clip(duration: f64, logo_path: &Path) -> Clip {
    let fill = Layer::FillColor(FillColorLayer {
        color: GAP_FILL_COLOR.to_string(),
    });
    Clip::with_duration(duration, vec![fill, logo_layer(logo_path)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_clip_has_content_and_logo() {
        let clip = build_main_clip(
            &SourceClip::new("clips/a.mp4", 5.0),
            Path::new("logo.png"),
            0.25,
        );
        assert_eq!(clip.layers.len(), 2);
        assert!((clip.duration() - 5.0).abs() < 1e-9);
        let video = clip.main_video().unwrap();
        assert_eq!(video.resize_mode, ResizeMode::ContainBlur);
        assert_eq!(video.blur, Some(0.25));
        assert_eq!(clip.image_overlays().count(), 1);
        assert!(clip.validate().is_ok());
    }

    #[test]
    fn test_zero_blur_is_omitted() {
        let clip = build_main_clip(&SourceClip::new("a.mp4", 2.0), Path::new("logo.png"), 0.0);
        assert_eq!(clip.main_video().unwrap().blur, None);
    }

    #[test]
    fn test_gap_clip_is_black_filler_with_explicit_duration() {
        let clip = build_gap_clip(0.2, Path::new("logo.png"));
        assert!(clip.is_filler());
        assert_eq!(clip.duration, Some(0.2));
        assert_eq!(clip.image_overlays().count(), 1);
        assert!(clip.validate().is_ok());
    }
}
