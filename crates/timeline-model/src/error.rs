//! Errors for reading and writing model files.

use std::path::PathBuf;

use reelweave_common::error::RenderError;

/// Errors that can occur when loading or saving specs, history, and ledgers.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid model: {message}")]
    ValidationError { message: String },
}

impl From<ModelError> for RenderError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::IoError { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                RenderError::file_not_found(path)
            }
            ModelError::IoError { path, source } => RenderError::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {source}", path.display()),
            )),
            ModelError::ParseError { path, source } => {
                RenderError::config(format!("{}: {source}", path.display()))
            }
            ModelError::ValidationError { message } => RenderError::graph_build(message),
        }
    }
}
