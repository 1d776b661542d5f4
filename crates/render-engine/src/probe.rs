//! Media probing with `ffprobe`.

use std::path::Path;
use std::process::Command;

use reelweave_common::error::{RenderError, RenderResult};
use reelweave_timeline_model::media::{MediaInfo, MediaProbe};
use serde::Deserialize;

/// Probes media files with the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    bin: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn is_available(&self) -> bool {
        crate::runner::command_exists(&self.bin)
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo> {
        if !path.exists() {
            return Err(RenderError::file_not_found(path));
        }

        let output = Command::new(&self.bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,duration,sample_aspect_ratio",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| RenderError::probe_failure(path, format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            return Err(RenderError::probe_failure(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let info = parse_probe_output(&raw).map_err(|message| RenderError::probe_failure(path, message))?;
        tracing::debug!(
            path = %path.display(),
            duration_secs = info.duration_secs,
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Probed media"
        );
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    sample_aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Turn `ffprobe -of json` output into [`MediaInfo`]. Missing fields fall
/// back to [`MediaInfo::FALLBACK`]; audio-only files keep the fallback
/// geometry.
pub(crate) fn parse_probe_output(raw: &str) -> Result<MediaInfo, String> {
    let parsed: ProbeOutput =
        serde_json::from_str(raw).map_err(|e| format!("unreadable probe output: {e}"))?;
    let stream = parsed.streams.first();

    let duration_secs = stream
        .and_then(|s| parse_seconds(s.duration.as_deref()))
        .or_else(|| parse_seconds(parsed.format.as_ref().and_then(|f| f.duration.as_deref())))
        .ok_or_else(|| "no duration reported".to_string())?;

    let fallback = MediaInfo::FALLBACK;
    Ok(MediaInfo {
        duration_secs,
        width: stream.and_then(|s| s.width).filter(|w| *w > 0).unwrap_or(fallback.width),
        height: stream.and_then(|s| s.height).filter(|h| *h > 0).unwrap_or(fallback.height),
        fps: stream
            .and_then(|s| parse_ratio(s.r_frame_rate.as_deref()?, '/'))
            .unwrap_or(fallback.fps),
        pixel_aspect: stream
            .and_then(|s| parse_ratio(s.sample_aspect_ratio.as_deref()?, ':'))
            .filter(|par| (*par - 1.0).abs() > 1e-9),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// `num<sep>den` as a positive ratio; `None` for zero or malformed values.
fn parse_ratio(value: &str, sep: char) -> Option<f64> {
    let (num, den) = value.split_once(sep)?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_stream() {
        let raw = r#"{
            "programs": [],
            "streams": [{
                "width": 1280, "height": 720, "r_frame_rate": "30000/1001",
                "duration": "12.345000", "sample_aspect_ratio": "1:1"
            }],
            "format": {"duration": "12.400000"}
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert!((info.duration_secs - 12.345).abs() < 1e-9);
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.pixel_aspect, None);
    }

    #[test]
    fn test_stream_duration_falls_back_to_format() {
        let raw = r#"{"streams": [{"width": 1920, "height": 1080, "r_frame_rate": "25/1"}],
                      "format": {"duration": "8.000000"}}"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.duration_secs, 8.0);
        assert_eq!(info.fps, 25.0);
    }

    #[test]
    fn test_anamorphic_pixels_are_kept() {
        let raw = r#"{"streams": [{"width": 1440, "height": 1080, "r_frame_rate": "30/1",
                      "duration": "3.0", "sample_aspect_ratio": "4:3"}]}"#;
        let info = parse_probe_output(raw).unwrap();
        let par = info.pixel_aspect.unwrap();
        assert!((par - 4.0 / 3.0).abs() < 1e-9);

        let unknown = r#"{"streams": [{"duration": "3.0", "sample_aspect_ratio": "0:1"}]}"#;
        assert_eq!(parse_probe_output(unknown).unwrap().pixel_aspect, None);
    }

    #[test]
    fn test_audio_only_keeps_fallback_geometry() {
        let raw = r#"{"streams": [], "format": {"duration": "4.5"}}"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.duration_secs, 4.5);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.fps, 30.0);
    }

    #[test]
    fn test_missing_duration_is_an_error() {
        assert!(parse_probe_output(r#"{"streams": [{"duration": "N/A"}]}"#).is_err());
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_missing_file_degrades_to_fallback() {
        let probe = FfprobeProbe::default();
        let path = Path::new("/nonexistent/reelweave/clip.mp4");
        assert!(matches!(
            probe.probe(path),
            Err(RenderError::FileNotFound { .. })
        ));
        assert_eq!(probe.probe_or_default(path), MediaInfo::FALLBACK);
    }
}
