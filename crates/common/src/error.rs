//! Error types shared across Reelweave crates.

use std::path::PathBuf;

/// Top-level error type for timeline compilation and rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A required channel asset (logo, declared transition) is absent.
    #[error("Missing {asset} asset: {path}")]
    AssetMissing { asset: String, path: PathBuf },

    #[error("No clips selected")]
    EmptySelection,

    /// Probe degradations are normally logged and defaulted; this variant
    /// is only surfaced by probes that are asked to be strict.
    #[error("Failed to probe {path}: {message}")]
    ProbeFailure { path: PathBuf, message: String },

    /// An internal invariant of the timeline was violated.
    #[error("Graph build error: {message}")]
    GraphBuild { message: String },

    #[error("{program} failed ({}): {stderr}", describe_exit(.code))]
    ExternalProcess {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid timecode '{value}': expected HH:MM:SS:FF")]
    InvalidTimecode { value: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RenderError.
pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    pub fn asset_missing(asset: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::AssetMissing {
            asset: asset.into(),
            path: path.into(),
        }
    }

    pub fn probe_failure(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn graph_build(msg: impl Into<String>) -> Self {
        Self::GraphBuild {
            message: msg.into(),
        }
    }

    pub fn external_process(
        program: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalProcess {
            program: program.into(),
            code,
            stderr: stderr.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Exit code of the failed external process, if this error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExternalProcess { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_process_message_keeps_stderr_verbatim() {
        let err = RenderError::external_process("ffmpeg", Some(1), "Invalid argument");
        assert_eq!(
            err.to_string(),
            "ffmpeg failed (exit code 1): Invalid argument"
        );
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_signal_termination_has_no_exit_code() {
        let err = RenderError::external_process("ffmpeg", None, "");
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_asset_missing_names_asset_and_path() {
        let err = RenderError::asset_missing("logo", "/channels/demo/logo.png");
        assert_eq!(
            err.to_string(),
            "Missing logo asset: /channels/demo/logo.png"
        );
    }
}
