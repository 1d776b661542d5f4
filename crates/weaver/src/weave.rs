//! Transition weaving: the "split one asset across a boundary" algorithm.
//!
//! Every boundary between two main clips gets one copy of the channel's
//! transition asset, split into three visible slices plus one audio track.
//!
//! # Algorithm
//!
//! 1. **Main clips:** each source becomes a contain-blur clip with the logo.
//! 2. **Pre-roll:** the tail `pre` seconds of the outgoing clip show
//!    `[0, min(pre, T))` of the asset.
//! 3. **Audio:** the asset's full audio is scheduled to start where the
//!    pre-roll starts.
//! 4. **Gap:** when `gap > 0`, a black filler of `gap` seconds shows
//!    `[pre, pre + gap)` of the asset.
//! 5. **Post-roll:** when `post = T - pre - gap > 0`, the head of the
//!    incoming clip shows `[pre + gap, T)`.
//!
//! With no transition asset (or a zero-length one) clips are simply
//! concatenated: no overlays, no gap fillers, no transition audio.

use std::path::PathBuf;

use reelweave_common::error::{RenderError, RenderResult};
use reelweave_timeline_model::builder::{build_gap_clip, build_main_clip, SourceClip};
use reelweave_timeline_model::channel::ResolvedChannel;
use reelweave_timeline_model::layer::{Layer, TransitionOverlayLayer, TransitionRole};
use reelweave_timeline_model::timeline::{AudioTrack, Clip, RenderParams, Timeline};

use crate::partition::TransitionPartition;

/// The transition asset and its probed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAsset {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Configuration for the transition weaver.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Output frame size and rate.
    pub params: RenderParams,

    /// Background blur strength for contain-blur main clips.
    pub blur: f64,

    /// Frame-quantized pre-roll length (seconds).
    pub pre_overlap_secs: f64,

    /// Frame-quantized gap filler length (seconds).
    pub gap_secs: f64,

    /// Full-frame logo placed on every clip.
    pub logo_path: PathBuf,

    /// `None` means clips are concatenated without transitions.
    pub transition: Option<TransitionAsset>,

    /// Mix volume of the scheduled transition audio.
    pub transition_volume: f64,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            params: RenderParams::default(),
            blur: 0.25,
            pre_overlap_secs: 0.2,
            gap_secs: 4.0 / 30.0,
            logo_path: PathBuf::from("logo.png"),
            transition: None,
            transition_volume: 1.0,
        }
    }
}

impl WeaverConfig {
    /// Build a config from a loaded channel. `transition_secs` is the
    /// probed duration of the channel's transition asset, if it has one;
    /// a non-positive duration disables transitions.
    pub fn from_channel(channel: &ResolvedChannel, transition_secs: Option<f64>) -> Self {
        let settings = &channel.settings;
        let transition = match (&channel.transition_path, transition_secs) {
            (Some(path), Some(duration_secs)) if duration_secs > 0.0 => Some(TransitionAsset {
                path: path.clone(),
                duration_secs,
            }),
            (Some(path), _) => {
                tracing::warn!(
                    channel = %channel.name,
                    path = %path.display(),
                    "Transition asset has no usable duration, concatenating without transitions"
                );
                None
            }
            (None, _) => None,
        };

        Self {
            params: RenderParams {
                fps: settings.fps,
                ..RenderParams::default()
            },
            blur: settings.blur,
            pre_overlap_secs: settings.pre_overlap_secs,
            gap_secs: settings.gap_secs,
            logo_path: channel.logo_path.clone(),
            transition,
            transition_volume: 1.0,
        }
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.params.width = width;
        self.params.height = height;
        self
    }

    pub fn with_source_audio(mut self, keep: bool) -> Self {
        self.params.keep_source_audio = keep;
        self
    }

    /// The active transition asset, ignoring zero-length ones.
    fn active_transition(&self) -> Option<&TransitionAsset> {
        self.transition
            .as_ref()
            .filter(|asset| asset.duration_secs > 0.0)
    }

    /// Partition of the active transition, if any.
    pub fn partition(&self) -> Option<TransitionPartition> {
        self.active_transition().map(|asset| {
            TransitionPartition::new(asset.duration_secs, self.pre_overlap_secs, self.gap_secs)
        })
    }
}

/// The transition weaver.
pub struct TransitionWeaver {
    config: WeaverConfig,
}

impl TransitionWeaver {
    /// Create a new weaver with the given configuration.
    pub fn new(config: WeaverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    /// Weave an ordered clip selection into a validated timeline.
    ///
    /// Sources with a non-positive duration are skipped with a warning.
    /// Returns `EmptySelection` when nothing usable is left.
    pub fn weave(&self, sources: &[SourceClip]) -> RenderResult<Timeline> {
        let usable: Vec<&SourceClip> = sources
            .iter()
            .filter(|source| {
                let ok = source.duration.is_finite() && source.duration > 0.0;
                if !ok {
                    tracing::warn!(
                        path = %source.path.display(),
                        duration = source.duration,
                        "Skipping source clip without usable duration"
                    );
                }
                ok
            })
            .collect();
        if usable.is_empty() {
            return Err(RenderError::EmptySelection);
        }

        let config = &self.config;
        let transition = config.active_transition().zip(config.partition());

        let mut clips: Vec<Clip> = Vec::with_capacity(usable.len() * 2);
        let mut audio_tracks = Vec::new();

        // Index and global start of the most recent main clip.
        let mut prev_index = 0usize;
        let mut prev_start = 0.0f64;
        clips.push(build_main_clip(usable[0], &config.logo_path, config.blur));

        for (boundary, pair) in usable.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            let prev_duration = prev.duration;
            let mut next_start = prev_start + prev_duration;

            let mut next_clip = build_main_clip(next, &config.logo_path, config.blur);

            if let Some((asset, partition)) = transition {
                if let Some(overlay) = pre_roll(asset, &partition, prev_duration) {
                    clips[prev_index].push_layer(Layer::TransitionOverlay(overlay));
                }
                audio_tracks.extend(transition_audio(
                    asset,
                    prev_start + prev_duration - partition.pre,
                    config.transition_volume,
                ));

                if partition.gap > 0.0 {
                    let mut gap_clip = build_gap_clip(partition.gap, &config.logo_path);
                    if let Some((from, to)) = partition.gap_source() {
                        gap_clip.push_layer(Layer::TransitionOverlay(overlay(
                            asset,
                            0.0,
                            to - from,
                            from,
                            to,
                            TransitionRole::Gap,
                        )));
                    }
                    clips.push(gap_clip);
                    next_start += partition.gap;
                }

                if let Some(overlay) = post_roll(asset, &partition, next.duration) {
                    next_clip.prepend_transition(overlay);
                }
            }

            tracing::debug!(
                boundary,
                prev = %prev.path.display(),
                next = %next.path.display(),
                next_start,
                "Wove clip boundary"
            );

            clips.push(next_clip);
            prev_index = clips.len() - 1;
            prev_start = next_start;
        }

        let timeline = Timeline::new(config.params.clone(), clips, audio_tracks)?;
        tracing::info!(
            sources = usable.len(),
            clips = timeline.clips().len(),
            audio_tracks = timeline.audio_tracks().len(),
            total_secs = timeline.total_duration(),
            "Timeline woven"
        );
        Ok(timeline)
    }
}

fn overlay(
    asset: &TransitionAsset,
    window_start: f64,
    window_stop: f64,
    source_cut_from: f64,
    source_cut_to: f64,
    role: TransitionRole,
) -> TransitionOverlayLayer {
    TransitionOverlayLayer {
        path: asset.path.clone(),
        window_start,
        window_stop,
        source_cut_from,
        source_cut_to,
        role,
    }
}

/// Overlay on the tail of the outgoing clip. When the clip is shorter
/// than `pre`, the window is clamped to the clip and the source slice is
/// shortened from the front so it still ends where the gap slice begins.
fn pre_roll(
    asset: &TransitionAsset,
    partition: &TransitionPartition,
    clip_duration: f64,
) -> Option<TransitionOverlayLayer> {
    let (_, source_end) = partition.pre_source();
    let window_start = (clip_duration - partition.pre).max(0.0);
    let window_len = clip_duration - window_start;
    let source_start = (source_end - window_len).max(0.0);
    (window_len > 0.0 && source_end > source_start).then(|| {
        overlay(
            asset,
            window_start,
            clip_duration,
            source_start,
            source_end,
            TransitionRole::PreRoll,
        )
    })
}

/// Overlay on the head of the incoming clip, clamped to the clip length.
fn post_roll(
    asset: &TransitionAsset,
    partition: &TransitionPartition,
    clip_duration: f64,
) -> Option<TransitionOverlayLayer> {
    let (source_start, _) = partition.post_source()?;
    let window_len = partition.post.min(clip_duration);
    (window_len > 0.0).then(|| {
        overlay(
            asset,
            0.0,
            window_len,
            source_start,
            source_start + window_len,
            TransitionRole::PostRoll,
        )
    })
}

/// The asset's full audio starting at `global_start`. A start before the
/// timeline origin trims the head of the audio instead; `None` when
/// nothing is left after trimming.
fn transition_audio(
    asset: &TransitionAsset,
    global_start: f64,
    mix_volume: f64,
) -> Option<AudioTrack> {
    let lead_in = (-global_start).max(0.0);
    if lead_in >= asset.duration_secs {
        tracing::debug!(global_start, "Transition audio ends before the timeline starts");
        return None;
    }
    Some(AudioTrack {
        path: asset.path.clone(),
        cut_from: lead_in,
        cut_to: asset.duration_secs,
        global_start: global_start.max(0.0),
        mix_volume,
    })
}
