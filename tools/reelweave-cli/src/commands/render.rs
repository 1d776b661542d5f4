//! Render a spec to video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelweave_common::config::AppConfig;
use reelweave_render_engine::filtergraph::{BatchFinish, FilterGraphConfig, RenderPlan};
use reelweave_render_engine::render::{
    render_timeline, ProgressCallback, RenderJob, RenderProgress, WORK_DIR_PREFIX,
};
use reelweave_render_engine::runner::FfmpegRunner;
use reelweave_timeline_model::builder::SourceClip;
use reelweave_timeline_model::channel::ChannelConfigStore;
use reelweave_timeline_model::history::{RenderHistory, RenderHistoryEntry, UsedClips};
use reelweave_timeline_model::spec::RenderSpec;
use reelweave_timeline_model::timeline::Timeline;

pub async fn run(
    config: &AppConfig,
    spec_path: PathBuf,
    dry_run: bool,
    channel: Option<String>,
) -> anyhow::Result<()> {
    println!("Rendering spec: {}", spec_path.display());

    let spec = RenderSpec::load(&spec_path)?;
    let sources = source_clips(&spec.timeline);
    let job = RenderJob::new(spec.timeline, &spec.out_path, &config.paths.temp_dir)
        .with_config(FilterGraphConfig::from_defaults(&config.render));

    println!("  Output: {}", job.output.display());
    println!("  Clips: {}", job.timeline.clips().len());
    println!("  Duration: {:.2}s", job.timeline.total_duration());

    if dry_run {
        let work_dir = config.paths.temp_dir.join(format!("{WORK_DIR_PREFIX}dryrun"));
        let plan = job.plan(&work_dir)?;
        println!("  Strategy: {:?} ({} ffmpeg run(s))\n", plan.strategy(), plan.invocation_count());
        print_plan(&plan, &config.render.ffmpeg_bin);
        return Ok(());
    }

    let runner = Arc::new(FfmpegRunner::new(&config.render.ffmpeg_bin));
    let progress_cb: ProgressCallback = Box::new(|p: RenderProgress| {
        print!(
            "\r  {:?} [{}/{}]: {:.1}% (ETA: {:.0}s)    ",
            p.stage,
            p.step,
            p.steps,
            p.progress * 100.0,
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    });

    let output = match render_timeline(job, runner, Some(progress_cb)).await {
        Ok(output) => {
            println!("\nRender complete: {}", output.display());
            output
        }
        Err(e) => {
            println!("\nRender failed: {e}");
            return Err(e.into());
        }
    };

    if let Some(channel) = channel {
        record_render(config, &channel, &output, sources)?;
    }
    Ok(())
}

/// The main clips of a timeline as the selection they were woven from.
fn source_clips(timeline: &Timeline) -> Vec<SourceClip> {
    timeline
        .clips()
        .iter()
        .filter_map(|clip| clip.main_video())
        .map(|video| SourceClip::new(&video.path, video.cut_to - video.cut_from))
        .collect()
}

fn record_render(
    config: &AppConfig,
    channel: &str,
    output: &Path,
    sources: Vec<SourceClip>,
) -> anyhow::Result<()> {
    let store = ChannelConfigStore::new(&config.paths);
    let now = chrono::Local::now().naive_local();

    let used = UsedClips::new(store.used_clips_path(channel)?);
    let total = used.record(sources.iter().map(|clip| clip.path.as_path()))?;

    let history = RenderHistory::new(store.history_dir(channel)?);
    let entry = RenderHistoryEntry::new(now, Some(output.to_path_buf()), sources);
    let day_file = history.append(&now, entry)?;

    println!("  History: {}", day_file.display());
    println!("  Used clips: {total}");
    Ok(())
}

fn print_plan(plan: &RenderPlan, ffmpeg: &str) {
    match plan {
        RenderPlan::SinglePass(invocation) => println!("{}", invocation.command_line(ffmpeg)),
        RenderPlan::Batch(batch) => {
            for clip in &batch.clip_renders {
                println!("{}\n", clip.command_line(ffmpeg));
            }
            println!("# {}:", batch.concat_list.display());
            print!("{}", batch.concat_list_contents);
            println!("\n{}\n", batch.concat.command_line(ffmpeg));
            match &batch.finish {
                BatchFinish::Mix(mix) => println!("{}", mix.command_line(ffmpeg)),
                BatchFinish::Copy { from, to } => {
                    println!("cp {} {}", from.display(), to.display())
                }
            }
        }
    }
}
