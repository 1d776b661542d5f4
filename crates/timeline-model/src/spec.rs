//! The render spec: a timeline plus its output path, as JSON.
//!
//! This is the intermediate form handed to external clip-based renderers
//! and read back by `reelweave render` / `reelweave xmeml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSpec {
    pub out_path: PathBuf,

    #[serde(flatten)]
    pub timeline: Timeline,
}

impl RenderSpec {
    pub fn new(out_path: impl Into<PathBuf>, timeline: Timeline) -> Self {
        Self {
            out_path: out_path.into(),
            timeline,
        }
    }

    /// Read and validate a spec file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let spec: RenderSpec = serde_json::from_str(&json).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        spec.timeline
            .validate()
            .map_err(|e| ModelError::ValidationError {
                message: format!("{}: {e}", path.display()),
            })?;
        Ok(spec)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
