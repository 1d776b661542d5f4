//! Random clip selection from a topic directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rand::Rng;
use reelweave_common::error::{RenderError, RenderResult};

use crate::builder::SourceClip;
use crate::media::MediaProbe;

/// Selection may overshoot the target by at most this much (seconds).
pub const SELECTION_OVERSHOOT_SECS: f64 = 180.0;

pub const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];

/// Video files in `dir` that are not in `used`, sorted by path.
pub fn list_candidates(dir: &Path, used: &BTreeSet<PathBuf>) -> RenderResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RenderError::file_not_found(dir));
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_clip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CLIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_clip && path.is_file() && !used.contains(&path) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates)
}

/// Pick random candidates until their total duration reaches
/// `target_secs`. Candidates that probe to a non-positive duration are
/// dropped. Stops early when the pool runs dry, and never keeps picking
/// once the total reaches `target_secs + SELECTION_OVERSHOOT_SECS`.
pub fn select_clips<R: Rng>(
    mut candidates: Vec<PathBuf>,
    target_secs: f64,
    probe: &dyn MediaProbe,
    rng: &mut R,
) -> Vec<SourceClip> {
    let max_secs = target_secs + SELECTION_OVERSHOOT_SECS;
    let mut selected = Vec::new();
    let mut total = 0.0;

    while total < target_secs && !candidates.is_empty() {
        let index = rng.gen_range(0..candidates.len());
        let path = candidates.swap_remove(index);
        let info = probe.probe_or_default(&path);
        if !info.is_usable() {
            tracing::warn!(path = %path.display(), "Skipping clip without usable duration");
            continue;
        }

        total += info.duration_secs;
        selected.push(SourceClip::new(path, info.duration_secs));
        if total >= max_secs {
            break;
        }
    }

    tracing::info!(
        selected = selected.len(),
        total_secs = total,
        target_secs,
        "Clip selection finished"
    );
    selected
}
