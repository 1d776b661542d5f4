//! Probed media metadata and the probe contract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reelweave_common::error::RenderResult;
use serde::{Deserialize, Serialize};

/// Metadata of one media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,

    /// Pixel aspect ratio; `None` means square pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_aspect: Option<f64>,
}

impl MediaInfo {
    /// Returned when probing fails.
    pub const FALLBACK: MediaInfo = MediaInfo {
        duration_secs: 0.0,
        width: 1920,
        height: 1080,
        fps: 30.0,
        pixel_aspect: None,
    };

    /// A file with no positive duration cannot be placed on a timeline.
    pub fn is_usable(&self) -> bool {
        self.duration_secs > 0.0
    }

    /// Effective pixel aspect ratio (1.0 for square pixels).
    pub fn pixel_aspect_ratio(&self) -> f64 {
        self.pixel_aspect.filter(|par| *par > 0.0).unwrap_or(1.0)
    }
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Looks up duration and geometry of media files.
pub trait MediaProbe {
    /// Probe a file, reporting failures.
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo>;

    /// Probe a file and degrade to [`MediaInfo::FALLBACK`] on failure.
    /// Never fails; callers must treat `duration_secs <= 0` as unusable.
    fn probe_or_default(&self, path: &Path) -> MediaInfo {
        match self.probe(path) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Probe failed, using defaults");
                MediaInfo::FALLBACK
            }
        }
    }
}

/// Pre-probed metadata keyed by path, so emitters can stay free of I/O.
#[derive(Debug, Clone, Default)]
pub struct MediaCatalog {
    entries: HashMap<PathBuf, MediaInfo>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe every path once, degrading failures to defaults.
    pub fn probe_all<'a, P>(probe: &dyn MediaProbe, paths: P) -> Self
    where
        P: IntoIterator<Item = &'a Path>,
    {
        let mut catalog = Self::new();
        for path in paths {
            if !catalog.entries.contains_key(path) {
                catalog.insert(path, probe.probe_or_default(path));
            }
        }
        catalog
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, info: MediaInfo) {
        self.entries.insert(path.into(), info);
    }

    pub fn get(&self, path: &Path) -> Option<&MediaInfo> {
        self.entries.get(path)
    }

    /// Catalog entry, or [`MediaInfo::FALLBACK`] with a warning.
    pub fn get_or_default(&self, path: &Path) -> MediaInfo {
        match self.entries.get(path) {
            Some(info) => *info,
            None => {
                tracing::warn!(path = %path.display(), "No probed metadata, using defaults");
                MediaInfo::FALLBACK
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
