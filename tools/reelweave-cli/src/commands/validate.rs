//! Validate a channel's configuration and assets.

use reelweave_common::config::AppConfig;
use reelweave_render_engine::probe::FfprobeProbe;
use reelweave_timeline_model::channel::ChannelConfigStore;
use reelweave_timeline_model::history::UsedClips;
use reelweave_timeline_model::media::MediaProbe;
use reelweave_weaver::WeaverConfig;

pub fn run(config: &AppConfig, channel: String) -> anyhow::Result<()> {
    println!("Validating channel: {channel}");

    let store = ChannelConfigStore::new(&config.paths);
    let resolved = store
        .load(&channel)
        .map_err(|e| anyhow::anyhow!("Failed to load channel: {e}"))?;
    let settings = &resolved.settings;

    println!("  Directory: {}", resolved.dir.display());
    println!("  FPS: {}", settings.fps);
    println!("  Blur: {}", settings.blur);
    println!("  Pre-overlap: {:.3}s", settings.pre_overlap_secs);
    println!("  Gap: {:.3}s", settings.gap_secs);
    println!("  Logo: {}", resolved.logo_path.display());

    let mut issues = Vec::new();
    let transition_secs = match &resolved.transition_path {
        Some(path) => {
            let probe = FfprobeProbe::new(&config.render.ffprobe_bin);
            let info = probe.probe_or_default(path);
            println!("  Transition: {} ({:.3}s)", path.display(), info.duration_secs);
            if !info.is_usable() {
                issues.push(format!(
                    "transition {} has no usable duration; clips will be joined without it",
                    path.display()
                ));
            }
            Some(info.duration_secs)
        }
        None => {
            println!("  Transition: none");
            None
        }
    };

    if let Some(partition) = WeaverConfig::from_channel(&resolved, transition_secs).partition() {
        println!(
            "  Partition: pre {:.3}s, gap {:.3}s, post {:.3}s",
            partition.pre, partition.gap, partition.post
        );
        if !partition.is_exhaustive() {
            issues.push(format!(
                "pre-overlap plus gap ({:.3}s) exceeds the {:.3}s transition; post-roll is empty",
                partition.pre + partition.gap,
                partition.total
            ));
        }
    }

    let used = UsedClips::new(store.used_clips_path(&channel)?).load();
    println!("  Used clips: {}", used.len());

    if issues.is_empty() {
        println!("\nChannel is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!("\n{} issue(s) found.", issues.len());
    }

    Ok(())
}
