use std::path::PathBuf;

use proptest::prelude::*;
use reelweave_common::error::RenderError;
use reelweave_timeline_model::builder::SourceClip;
use reelweave_timeline_model::layer::{Layer, TransitionOverlayLayer, TransitionRole};
use reelweave_timeline_model::timeline::{ContentLayer, Timeline};
use reelweave_weaver::{TransitionAsset, TransitionWeaver, WeaverConfig};

const EPS: f64 = 1e-9;

fn config(transition_secs: Option<f64>, pre: f64, gap: f64) -> WeaverConfig {
    WeaverConfig {
        pre_overlap_secs: pre,
        gap_secs: gap,
        logo_path: PathBuf::from("channel/logo.png"),
        transition: transition_secs.map(|duration_secs| TransitionAsset {
            path: PathBuf::from("channel/transition.mov"),
            duration_secs,
        }),
        ..WeaverConfig::default()
    }
}

fn sources(durations: &[f64]) -> Vec<SourceClip> {
    durations
        .iter()
        .enumerate()
        .map(|(i, d)| SourceClip::new(format!("clips/{i}.mp4"), *d))
        .collect()
}

fn overlays(timeline: &Timeline) -> Vec<&TransitionOverlayLayer> {
    timeline
        .clips()
        .iter()
        .flat_map(|clip| clip.transition_overlays())
        .collect()
}

#[test]
fn three_clips_with_transition_produce_gaps_and_audio() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[5.0, 5.0, 5.0])).unwrap();

    let clips = timeline.clips();
    assert_eq!(clips.len(), 5);
    assert!(!clips[0].is_filler());
    assert!(clips[1].is_filler());
    assert!(!clips[2].is_filler());
    assert!(clips[3].is_filler());
    assert!(!clips[4].is_filler());
    assert!((clips[1].duration() - 0.2).abs() < EPS);
    assert!((timeline.total_duration() - 15.4).abs() < 1e-6);

    let tracks = timeline.audio_tracks();
    assert_eq!(tracks.len(), 2);
    assert!((tracks[0].global_start - 4.6).abs() < 1e-6);
    assert!((tracks[1].global_start - 9.8).abs() < 1e-6);
    for track in tracks {
        assert_eq!(track.cut_from, 0.0);
        assert!((track.cut_to - 1.0).abs() < EPS);
        assert_eq!(track.path, PathBuf::from("channel/transition.mov"));
    }

    // First clip: pre-roll only. Middle: post-roll then pre-roll. Last: post-roll only.
    let roles = |i: usize| -> Vec<TransitionRole> {
        clips[i].transition_overlays().map(|o| o.role).collect()
    };
    assert_eq!(roles(0), vec![TransitionRole::PreRoll]);
    assert_eq!(roles(1), vec![TransitionRole::Gap]);
    assert_eq!(roles(2), vec![TransitionRole::PostRoll, TransitionRole::PreRoll]);
    assert_eq!(roles(4), vec![TransitionRole::PostRoll]);

    let pre = clips[0].transition_overlays().next().unwrap();
    assert!((pre.window_start - 4.6).abs() < 1e-6);
    assert!((pre.window_stop - 5.0).abs() < EPS);
    assert!((pre.source_cut_to - 0.4).abs() < EPS);

    let post = clips[2].transition_overlays().next().unwrap();
    assert_eq!(post.window_start, 0.0);
    assert!((post.window_stop - 0.4).abs() < 1e-6);
    assert!((post.source_cut_from - 0.6).abs() < 1e-6);
    assert!((post.source_cut_to - 1.0).abs() < EPS);
}

#[test]
fn main_clips_carry_contain_blur_video_and_logo() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[5.0, 3.0])).unwrap();

    for clip in timeline.clips() {
        assert_eq!(clip.image_overlays().count(), 1);
        assert_eq!(
            clip.image_overlays().next().unwrap().path,
            PathBuf::from("channel/logo.png")
        );
    }
    match timeline.clips()[2].content() {
        Some(ContentLayer::Video(video)) => {
            assert_eq!(video.path, PathBuf::from("clips/1.mp4"));
            assert_eq!(video.cut_from, 0.0);
            assert_eq!(video.cut_to, 3.0);
            assert_eq!(video.blur, Some(0.25));
        }
        other => panic!("expected video content, got {other:?}"),
    }
    // Overlays sit above the content and logo layers.
    assert!(matches!(
        timeline.clips()[0].layers.last(),
        Some(Layer::TransitionOverlay(_))
    ));
}

#[test]
fn single_clip_has_no_transitions() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[7.5])).unwrap();
    assert_eq!(timeline.clips().len(), 1);
    assert!(timeline.audio_tracks().is_empty());
    assert!(overlays(&timeline).is_empty());
    assert!((timeline.total_duration() - 7.5).abs() < EPS);
}

#[test]
fn missing_transition_concatenates_plain_clips() {
    let weaver = TransitionWeaver::new(config(None, 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[5.0, 5.0, 5.0])).unwrap();
    assert_eq!(timeline.clips().len(), 3);
    assert!(timeline.audio_tracks().is_empty());
    assert!(overlays(&timeline).is_empty());
    assert!(timeline.clips().iter().all(|clip| !clip.is_filler()));
    assert!((timeline.total_duration() - 15.0).abs() < EPS);
}

#[test]
fn zero_gap_emits_no_filler_clips() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.5, 0.0));
    let timeline = weaver.weave(&sources(&[4.0, 4.0])).unwrap();
    assert_eq!(timeline.clips().len(), 2);
    assert_eq!(timeline.audio_tracks().len(), 1);
    assert!((timeline.audio_tracks()[0].global_start - 3.5).abs() < EPS);
    let post = timeline.clips()[1].transition_overlays().next().unwrap();
    assert!((post.source_cut_from - 0.5).abs() < EPS);
}

#[test]
fn empty_selection_is_rejected() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.4, 0.2));
    assert!(matches!(weaver.weave(&[]), Err(RenderError::EmptySelection)));
    assert!(matches!(
        weaver.weave(&sources(&[0.0, -1.0])),
        Err(RenderError::EmptySelection)
    ));
}

#[test]
fn unusable_sources_are_skipped() {
    let weaver = TransitionWeaver::new(config(None, 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[5.0, 0.0, 2.0])).unwrap();
    assert_eq!(timeline.clips().len(), 2);
    assert!((timeline.total_duration() - 7.0).abs() < EPS);
}

/// When pre-overlap and gap already cover the whole asset there is no
/// post-roll, yet the audio track still plays the full asset and so runs
/// past the end of the visible transition.
#[test]
fn short_transition_keeps_full_audio_without_post_roll() {
    let weaver = TransitionWeaver::new(config(Some(0.5), 0.4, 0.2));
    let timeline = weaver.weave(&sources(&[5.0, 5.0])).unwrap();

    let roles: Vec<TransitionRole> = overlays(&timeline).iter().map(|o| o.role).collect();
    assert_eq!(roles, vec![TransitionRole::PreRoll, TransitionRole::Gap]);

    let gap = timeline.clips()[1].transition_overlays().next().unwrap();
    assert!((gap.source_cut_from - 0.4).abs() < EPS);
    assert!((gap.source_cut_to - 0.5).abs() < EPS);
    assert!((gap.window_stop - 0.1).abs() < 1e-6);

    let track = &timeline.audio_tracks()[0];
    assert!((track.duration() - 0.5).abs() < EPS);
    assert!((track.global_start - 4.6).abs() < 1e-6);
}

#[test]
fn woven_timeline_round_trips_through_json() {
    let weaver = TransitionWeaver::new(config(Some(1.0), 0.4, 0.2).with_frame_size(1080, 1920));
    let timeline = weaver.weave(&sources(&[3.0, 4.0])).unwrap();
    let json = serde_json::to_string(&timeline).unwrap();
    let back: Timeline = serde_json::from_str(&json).unwrap();
    assert_eq!(back, timeline);
    assert_eq!(back.width(), 1080);
    assert_eq!(back.height(), 1920);
}

proptest! {
    #[test]
    fn partition_and_counts_hold_for_any_selection(
        durations in prop::collection::vec(1.0f64..30.0, 1..12),
        transition in 0.1f64..3.0,
        pre_frames in 0u32..20,
        gap_frames in 0u32..20,
    ) {
        let pre = pre_frames as f64 / 30.0;
        let gap = gap_frames as f64 / 30.0;
        let weaver = TransitionWeaver::new(config(Some(transition), pre, gap));
        let timeline = weaver.weave(&sources(&durations)).unwrap();

        let n = durations.len();
        let boundaries = n - 1;
        prop_assert_eq!(timeline.audio_tracks().len(), boundaries);
        let expected_clips = if gap > 0.0 { n + boundaries } else { n };
        prop_assert_eq!(timeline.clips().len(), expected_clips);

        let expected_total: f64 = durations.iter().sum::<f64>() + gap * boundaries as f64;
        prop_assert!((timeline.total_duration() - expected_total).abs() < 1e-6);

        let partition = weaver.config().partition().unwrap();
        prop_assert!(partition.post >= 0.0);
        if pre + gap < transition {
            prop_assert!((partition.pre + partition.gap + partition.post - transition).abs() < 1e-9);
        }

        let main_clips: Vec<_> = timeline.clips().iter().filter(|c| !c.is_filler()).collect();
        prop_assert!(main_clips[0]
            .transition_overlays()
            .all(|o| o.role == TransitionRole::PreRoll));
        prop_assert!(main_clips[n - 1]
            .transition_overlays()
            .all(|o| o.role == TransitionRole::PostRoll));

        for clip in timeline.clips() {
            for overlay in clip.transition_overlays() {
                prop_assert!(overlay.window_start >= 0.0);
                prop_assert!(overlay.window_stop <= clip.duration() + 1e-9);
                prop_assert!(overlay.source_cut_to <= transition + 1e-9);
            }
        }
    }
}
