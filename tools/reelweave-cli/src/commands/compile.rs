//! Weave a clip selection into a render spec.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use reelweave_common::config::AppConfig;
use reelweave_render_engine::probe::FfprobeProbe;
use reelweave_timeline_model::builder::SourceClip;
use reelweave_timeline_model::channel::ChannelConfigStore;
use reelweave_timeline_model::media::MediaProbe;
use reelweave_timeline_model::spec::RenderSpec;
use reelweave_weaver::{TransitionWeaver, WeaverConfig};

pub fn run(
    config: &AppConfig,
    channel: String,
    clips: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    spec_out: Option<PathBuf>,
    keep_source_audio: bool,
) -> anyhow::Result<()> {
    println!("Compiling {} clip(s) for channel: {channel}", clips.len());

    let store = ChannelConfigStore::new(&config.paths);
    let resolved = store.load(&channel)?;

    let probe = FfprobeProbe::new(&config.render.ffprobe_bin);
    let sources: Vec<SourceClip> = clips
        .iter()
        .map(|path| SourceClip::new(path, probe.probe_or_default(path).duration_secs))
        .collect();
    let transition_secs = resolved
        .transition_path
        .as_deref()
        .map(|path| probe.probe_or_default(path).duration_secs);

    let weaver_config = WeaverConfig::from_channel(&resolved, transition_secs)
        .with_frame_size(config.render.width, config.render.height)
        .with_source_audio(keep_source_audio);
    let timeline = TransitionWeaver::new(weaver_config).weave(&sources)?;

    let now = chrono::Local::now().naive_local();
    let out_dir = out_dir.unwrap_or_else(|| config.paths.output_dir.clone());
    let out_path = out_dir.join(output_file_name(&channel, &now));
    let spec_path = spec_out.unwrap_or_else(|| out_path.with_extension("json"));

    println!("  Clips: {}", timeline.clips().len());
    println!("  Transition tracks: {}", timeline.audio_tracks().len());
    println!("  Duration: {:.2}s", timeline.total_duration());
    println!(
        "  Resolution: {}x{} @ {} fps",
        timeline.width(),
        timeline.height(),
        timeline.fps()
    );

    RenderSpec::new(&out_path, timeline).save(&spec_path)?;
    println!("  Output: {}", out_path.display());
    println!("\nSpec written: {}", spec_path.display());
    Ok(())
}

/// `<channel>_<YYYY-MM-DD_HH-MM-SS>.mp4`.
pub fn output_file_name(channel: &str, at: &NaiveDateTime) -> String {
    format!("{channel}_{}.mp4", at.format("%Y-%m-%d_%H-%M-%S"))
}
