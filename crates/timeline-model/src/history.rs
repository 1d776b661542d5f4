//! Render history and the used-clip ledger.
//!
//! History is stored per day under `history/<YYYY>/<M>/<YYYY>_<M>_<D>.json`
//! as a JSON list of entries. The ledger (`used_videos.json`) is the set of
//! every clip path a channel has already published, so the selector can
//! avoid reusing footage.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::builder::SourceClip;
use crate::error::ModelError;

pub const HISTORY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One completed render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHistoryEntry {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub datetime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_path: Option<PathBuf>,

    pub clips: Vec<SourceClip>,
}

/// Day-sharded render history of one channel.
#[derive(Debug, Clone)]
pub struct RenderHistory {
    root: PathBuf,
}

/// Set of clip paths a channel has already used.
#[derive(Debug, Clone)]
pub struct UsedClips {
    path: PathBuf,
}

/// Ledger files written by older tools hold objects instead of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerItem {
    Path(PathBuf),
    Object { path: PathBuf },
}

impl RenderHistoryEntry {
    pub fn new(at: NaiveDateTime, out_path: Option<PathBuf>, clips: Vec<SourceClip>) -> Self {
        Self {
            datetime: at.format(HISTORY_DATETIME_FORMAT).to_string(),
            out_path,
            clips,
        }
    }
}

impl RenderHistory {
    /// History rooted at a channel's `history/` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File holding the entries of the day `at` falls on.
    pub fn day_file(&self, at: &NaiveDateTime) -> PathBuf {
        let date = at.date();
        self.root
            .join(date.year().to_string())
            .join(date.month().to_string())
            .join(format!("{}_{}_{}.json", date.year(), date.month(), date.day()))
    }

    /// Append an entry to its day file. A missing, unreadable, or
    /// non-list day file starts a fresh list.
    pub fn append(&self, at: &NaiveDateTime, entry: RenderHistoryEntry) -> Result<PathBuf, ModelError> {
        let path = self.day_file(at);
        let mut entries = read_day_file(&path).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "Discarding unreadable history file");
            Vec::new()
        });
        entries.push(entry);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        write_json(&path, &entries)?;
        tracing::info!(path = %path.display(), entries = entries.len(), "Saved render history");
        Ok(path)
    }

    /// Every entry across all day files, oldest first.
    pub fn entries(&self) -> Result<Vec<RenderHistoryEntry>, ModelError> {
        let mut files = Vec::new();
        collect_json_files(&self.root, &mut files)?;

        let mut entries = Vec::new();
        for file in files {
            match read_day_file(&file) {
                Ok(day) => entries.extend(day),
                Err(err) => {
                    tracing::warn!(path = %file.display(), error = %err, "Skipping unreadable history file")
                }
            }
        }
        entries.sort_by(|a, b| a.datetime.cmp(&b.datetime));
        Ok(entries)
    }
}

impl UsedClips {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current ledger contents. Missing or corrupt files read as empty.
    pub fn load(&self) -> BTreeSet<PathBuf> {
        if !self.path.exists() {
            return BTreeSet::new();
        }
        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                serde_json::from_str::<Vec<LedgerItem>>(&json).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(items) => items
                .into_iter()
                .map(|item| match item {
                    LedgerItem::Path(path) | LedgerItem::Object { path } => path,
                })
                .collect(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Ignoring unreadable used-clip ledger");
                BTreeSet::new()
            }
        }
    }

    /// Union `clips` into the ledger. Returns the new ledger size.
    pub fn record<'a, I>(&self, clips: I) -> Result<usize, ModelError>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut used = self.load();
        used.extend(clips.into_iter().map(Path::to_path_buf));
        let list: Vec<&PathBuf> = used.iter().collect();
        write_json(&self.path, &list)?;
        tracing::info!(path = %self.path.display(), clips = used.len(), "Updated used-clip ledger");
        Ok(used.len())
    }
}

fn read_day_file(path: &Path) -> Result<Vec<RenderHistoryEntry>, ModelError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| ModelError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ModelError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ModelError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| ModelError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ModelError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| ModelError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|e| ModelError::IoError {
                path: dir.to_path_buf(),
                source: e,
            })?
            .path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}
