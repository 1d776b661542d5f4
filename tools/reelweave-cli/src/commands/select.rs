//! Randomly select unused clips from a topic directory.

use rand::rngs::StdRng;
use rand::SeedableRng;
use reelweave_common::config::AppConfig;
use reelweave_common::error::RenderError;
use reelweave_render_engine::probe::FfprobeProbe;
use reelweave_timeline_model::channel::ChannelConfigStore;
use reelweave_timeline_model::history::UsedClips;
use reelweave_timeline_model::selection::{list_candidates, select_clips};

pub fn run(
    config: &AppConfig,
    channel: String,
    topic: String,
    target_secs: f64,
    seed: Option<u64>,
    paths_only: bool,
) -> anyhow::Result<()> {
    let store = ChannelConfigStore::new(&config.paths);
    let used = UsedClips::new(store.used_clips_path(&channel)?).load();
    let topic_dir = config.paths.topic_dir(&topic);
    let candidates = list_candidates(&topic_dir, &used)?;

    tracing::info!(
        channel = %channel,
        topic = %topic,
        candidates = candidates.len(),
        used = used.len(),
        "Selecting clips"
    );

    let probe = FfprobeProbe::new(&config.render.ffprobe_bin);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let selected = select_clips(candidates, target_secs, &probe, &mut rng);
    if selected.is_empty() {
        return Err(RenderError::EmptySelection.into());
    }

    if paths_only {
        for clip in &selected {
            println!("{}", clip.path.display());
        }
        return Ok(());
    }

    println!("Selected {} clip(s) from {}", selected.len(), topic_dir.display());
    for clip in &selected {
        println!("  {:>8.2}s  {}", clip.duration, clip.path.display());
    }
    let total: f64 = selected.iter().map(|clip| clip.duration).sum();
    println!("\nTotal: {total:.2}s (target {target_secs:.0}s)");
    Ok(())
}
