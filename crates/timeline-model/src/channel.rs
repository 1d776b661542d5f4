//! Channel configuration and the on-disk channel store.
//!
//! A channel directory looks like:
//!
//! ```text
//! <channels_dir>/<channel>/
//! ├── config.json        fps, blur, preoverlap, gap, logo, transition
//! ├── logo.png
//! ├── transition.mov     (optional)
//! ├── used_videos.json
//! └── history/YYYY/M/YYYY_M_D.json
//! ```
//!
//! `config.json` is frequently hand-edited or written by a UI that stores
//! numbers as strings, so numeric fields are parsed leniently.

use std::path::{Path, PathBuf};

use reelweave_common::config::PathsConfig;
use reelweave_common::error::{RenderError, RenderResult};
use reelweave_common::timecode::{frames_to_seconds, seconds_to_frames, Timecode};
use serde::{Deserialize, Serialize};

pub const CHANNEL_CONFIG_FILE: &str = "config.json";
pub const USED_CLIPS_FILE: &str = "used_videos.json";
pub const HISTORY_DIR: &str = "history";

/// A number that may have been written as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LenientNumber {
    Number(f64),
    Text(String),
}

/// A duration written either as `HH:MM:SS:FF` or as seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Seconds(f64),
    Text(String),
}

/// Raw `config.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub fps: LenientNumber,
    pub blur: LenientNumber,
    pub preoverlap: DurationSpec,
    pub gap: DurationSpec,

    /// Logo file name, relative to the channel directory.
    pub logo: String,

    /// Transition file name. Absent or empty disables transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

/// Typed, frame-quantized channel settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    pub fps: u32,
    pub blur: f64,
    pub pre_overlap_secs: f64,
    pub gap_secs: f64,
}

/// A channel whose configuration parsed and whose assets exist.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub name: String,
    pub dir: PathBuf,
    pub config: ChannelConfig,
    pub settings: ChannelSettings,
    pub logo_path: PathBuf,
    pub transition_path: Option<PathBuf>,
}

/// Reads and validates channel directories under `PathsConfig::channels_dir`.
#[derive(Debug, Clone)]
pub struct ChannelConfigStore {
    channels_dir: PathBuf,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            fps: LenientNumber::Number(30.0),
            blur: LenientNumber::Number(0.25),
            preoverlap: DurationSpec::Text("00:00:00:06".to_string()),
            gap: DurationSpec::Text("00:00:00:04".to_string()),
            logo: "logo.png".to_string(),
            transition: None,
        }
    }
}

impl LenientNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }
}

impl DurationSpec {
    /// Whole frames at `fps`. Empty text is zero.
    pub fn to_frames(&self, fps: u32) -> RenderResult<u64> {
        match self {
            Self::Seconds(secs) => Ok(seconds_to_frames(*secs, fps)),
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Ok(0)
                } else if text.contains(':') {
                    Ok(Timecode::parse(text)?.to_frames(fps))
                } else {
                    text.parse::<f64>()
                        .map(|secs| seconds_to_frames(secs, fps))
                        .map_err(|_| RenderError::InvalidTimecode {
                            value: text.to_string(),
                        })
                }
            }
        }
    }

    /// Frame-quantized seconds.
    pub fn to_seconds(&self, fps: u32) -> RenderResult<f64> {
        Ok(frames_to_seconds(self.to_frames(fps)?, fps))
    }
}

impl ChannelConfig {
    /// Parse a `config.json` body.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configured transition file name, if transitions are enabled.
    pub fn transition_file(&self) -> Option<&str> {
        self.transition
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Convert raw values into typed settings.
    ///
    /// An unusable `fps` is fatal. An unusable `blur` disables blur.
    pub fn resolve(&self) -> RenderResult<ChannelSettings> {
        let fps = match self.fps.as_f64() {
            Some(fps) if fps.is_finite() && fps >= 1.0 => fps.round() as u32,
            _ => {
                return Err(RenderError::config(format!(
                    "fps must be a positive number, got {:?}",
                    self.fps
                )))
            }
        };

        let blur = match self.blur.as_f64() {
            Some(blur) if blur.is_finite() && blur >= 0.0 => blur,
            _ => {
                tracing::warn!(blur = ?self.blur, "Unusable blur value, disabling blur");
                0.0
            }
        };

        Ok(ChannelSettings {
            fps,
            blur,
            pre_overlap_secs: self.preoverlap.to_seconds(fps)?,
            gap_secs: self.gap.to_seconds(fps)?,
        })
    }
}

impl ChannelConfigStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            channels_dir: paths.channels_dir.clone(),
        }
    }

    pub fn channels_dir(&self) -> &Path {
        &self.channels_dir
    }

    /// Names of every channel directory, sorted.
    pub fn list_channels(&self) -> RenderResult<Vec<String>> {
        if !self.channels_dir.is_dir() {
            return Err(RenderError::file_not_found(&self.channels_dir));
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.channels_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Directory of an existing channel.
    pub fn channel_dir(&self, channel: &str) -> RenderResult<PathBuf> {
        let dir = self.channels_dir.join(channel);
        if !dir.is_dir() {
            return Err(RenderError::file_not_found(dir));
        }
        Ok(dir)
    }

    pub fn used_clips_path(&self, channel: &str) -> RenderResult<PathBuf> {
        Ok(self.channel_dir(channel)?.join(USED_CLIPS_FILE))
    }

    pub fn history_dir(&self, channel: &str) -> RenderResult<PathBuf> {
        Ok(self.channel_dir(channel)?.join(HISTORY_DIR))
    }

    /// Load a channel and check its assets. Fails before any timeline is
    /// built if the logo or a declared transition is missing.
    pub fn load(&self, channel: &str) -> RenderResult<ResolvedChannel> {
        let dir = self.channel_dir(channel)?;
        let config_path = dir.join(CHANNEL_CONFIG_FILE);
        if !config_path.is_file() {
            return Err(RenderError::file_not_found(config_path));
        }

        let config = ChannelConfig::from_json(&std::fs::read_to_string(&config_path)?)
            .map_err(|err| RenderError::config(format!("{}: {err}", config_path.display())))?;
        let settings = config.resolve()?;

        let logo_path = dir.join(config.logo.trim());
        if config.logo.trim().is_empty() || !logo_path.is_file() {
            return Err(RenderError::asset_missing("logo", logo_path));
        }

        let transition_path = match config.transition_file() {
            Some(file) => {
                let path = dir.join(file);
                if !path.is_file() {
                    return Err(RenderError::asset_missing("transition", path));
                }
                Some(path)
            }
            None => None,
        };

        tracing::info!(
            channel,
            fps = settings.fps,
            blur = settings.blur,
            pre_overlap_secs = settings.pre_overlap_secs,
            gap_secs = settings.gap_secs,
            transition = transition_path.is_some(),
            "Loaded channel configuration"
        );

        Ok(ResolvedChannel {
            name: channel.to_string(),
            dir,
            config,
            settings,
            logo_path,
            transition_path,
        })
    }
}
