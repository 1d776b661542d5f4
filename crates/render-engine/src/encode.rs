//! Encoder argument sets.

use reelweave_common::config::{RenderDefaults, VideoEncoder};

/// Codec options shared by every encoding pass of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub video: VideoEncoder,
    pub audio_bitrate_kbps: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video: VideoEncoder::default(),
            audio_bitrate_kbps: 192,
        }
    }
}

impl EncoderSettings {
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            video: defaults.encoder,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
        }
    }

    pub fn video_args(&self) -> Vec<String> {
        let args: &[&str] = match self.video {
            VideoEncoder::Libx264 => &[
                "-c:v", "libx264", "-preset", "medium", "-crf", "20", "-pix_fmt", "yuv420p",
            ],
            VideoEncoder::H264Nvenc => &[
                "-c:v", "h264_nvenc", "-preset", "p6", "-tune", "hq", "-rc", "vbr", "-cq", "23",
                "-b:v", "0",
            ],
        };
        args.iter().map(|arg| arg.to_string()).collect()
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps.max(64)),
        ]
    }
}
