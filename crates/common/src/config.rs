//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Asset and output directories.
    pub paths: PathsConfig,

    /// Default render parameters.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Filesystem roots. Passed explicitly to every component that touches
/// the disk; nothing reads these from process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// One subdirectory per channel (config.json, logo, transition, history).
    pub channels_dir: PathBuf,

    /// Source clip library, one subdirectory per topic.
    pub clips_dir: PathBuf,

    /// Where rendered videos and interchange documents land.
    pub output_dir: PathBuf,

    /// Scratch space for multi-pass renders.
    pub temp_dir: PathBuf,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderDefaults {
    pub width: u32,
    pub height: u32,

    /// Timelines with more clips than this are rendered clip by clip.
    pub batch_threshold: usize,

    pub encoder: VideoEncoder,

    pub audio_bitrate_kbps: u32,

    /// Encoder binary name or path.
    pub ffmpeg_bin: String,

    /// Probe binary name or path.
    pub ffprobe_bin: String,
}

/// Video encoder used for final and intermediate outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    /// Software H.264.
    #[default]
    Libx264,
    /// NVIDIA hardware H.264.
    H264Nvenc,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelweave=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path. Logs are appended.
    pub file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = data_home().join("reelweave");
        Self {
            channels_dir: base.join("channels"),
            clips_dir: base.join("clips"),
            output_dir: base.join("output"),
            temp_dir: base.join("temp"),
        }
    }
}

impl PathsConfig {
    /// All four roots under a single base directory.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            channels_dir: base.join("channels"),
            clips_dir: base.join("clips"),
            output_dir: base.join("output"),
            temp_dir: base.join("temp"),
        }
    }

    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.channels_dir.join(channel)
    }

    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.clips_dir.join(topic)
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            batch_threshold: 10,
            encoder: VideoEncoder::Libx264,
            audio_bitrate_kbps: 192,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl VideoEncoder {
    /// Codec name as the encoder binary expects it.
    pub fn codec_name(self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::H264Nvenc => "h264_nvenc",
        }
    }
}

impl std::str::FromStr for VideoEncoder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "libx264" | "x264" => Ok(Self::Libx264),
            "h264_nvenc" | "nvenc" => Ok(Self::H264Nvenc),
            other => Err(format!(
                "Unknown encoder: {other}. Use: libx264, h264_nvenc"
            )),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("reelweave").join("config.json")
}

fn data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"))
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_defaults_match_channel_output_format() {
        let render = RenderDefaults::default();
        assert_eq!((render.width, render.height), (1920, 1080));
        assert_eq!(render.batch_threshold, 10);
        assert_eq!(render.encoder, VideoEncoder::Libx264);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"render":{"encoder":"h264_nvenc"}}"#).unwrap();
        assert_eq!(config.render.encoder, VideoEncoder::H264Nvenc);
        assert_eq!(config.render.batch_threshold, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.paths = PathsConfig::rooted_at(dir.path());
        config.render.batch_threshold = 4;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.paths, config.paths);
        assert_eq!(loaded.render.batch_threshold, 4);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.render, RenderDefaults::default());
    }

    #[test]
    fn test_encoder_from_str() {
        assert_eq!("nvenc".parse::<VideoEncoder>(), Ok(VideoEncoder::H264Nvenc));
        assert_eq!("libx264".parse::<VideoEncoder>(), Ok(VideoEncoder::Libx264));
        assert!("prores".parse::<VideoEncoder>().is_err());
    }
}
