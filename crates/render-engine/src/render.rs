//! Render jobs: compile a timeline, run the plan, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use reelweave_common::error::{RenderError, RenderResult};
use reelweave_timeline_model::timeline::Timeline;

use crate::filtergraph::{
    BatchFinish, BatchPlan, FfmpegInvocation, FilterGraphConfig, FilterGraphEmitter, RenderPlan,
    RenderStrategy,
};
use crate::runner::{ProcessProgress, ProcessRunner};

/// Prefix of the per-render scratch directory used by batch renders.
pub const WORK_DIR_PREFIX: &str = "ffmpeg_render_";

/// A timeline ready to be rendered.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub timeline: Timeline,

    /// Output file path.
    pub output: PathBuf,

    /// Parent of the scratch directory for batch renders.
    pub temp_root: PathBuf,

    pub config: FilterGraphConfig,
}

/// Progress callback for rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProgress {
    pub stage: RenderStage,

    /// 1-based index of the current encoder run.
    pub step: usize,

    /// Total number of encoder runs in the plan.
    pub steps: usize,

    /// Overall progress [0.0, 1.0].
    pub progress: f64,

    /// Estimated time remaining in the current step (seconds).
    pub eta_secs: f64,
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    /// Single-pass encode of the whole timeline.
    Rendering,
    /// Batch: encoding one clip.
    RenderingClip,
    /// Batch: joining the clip files.
    Concatenating,
    /// Batch: mixing audio tracks over the joined file.
    Mixing,
    Finalizing,
    Complete,
    Failed,
}

impl RenderJob {
    pub fn new(timeline: Timeline, output: impl Into<PathBuf>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            timeline,
            output: output.into(),
            temp_root: temp_root.into(),
            config: FilterGraphConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FilterGraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile the job against an explicit scratch directory without
    /// running anything.
    pub fn plan(&self, work_dir: &Path) -> RenderResult<RenderPlan> {
        FilterGraphEmitter::new(self.config.clone()).compile(&self.timeline, &self.output, work_dir)
    }
}

/// Render a timeline to a video file.
///
/// This is the main entry point for rendering. The encoder runs on the
/// blocking thread pool; the returned future resolves to the output path.
pub async fn render_timeline(
    job: RenderJob,
    runner: Arc<dyn ProcessRunner>,
    progress: Option<ProgressCallback>,
) -> RenderResult<PathBuf> {
    tracing::info!(
        output = %job.output.display(),
        clips = job.timeline.clips().len(),
        duration_secs = job.timeline.total_duration(),
        "Starting render"
    );

    if !runner.is_available() {
        return Err(RenderError::unsupported(format!(
            "No supported render backend found (expected {} in PATH)",
            runner.name()
        )));
    }

    tokio::task::spawn_blocking(move || render_blocking(&job, runner.as_ref(), progress.as_ref()))
        .await
        .map_err(|e| RenderError::Other(anyhow::anyhow!("render task panicked: {e}")))?
}

/// Synchronous body of [`render_timeline`].
pub fn render_blocking(
    job: &RenderJob,
    runner: &dyn ProcessRunner,
    progress: Option<&ProgressCallback>,
) -> RenderResult<PathBuf> {
    let started = Instant::now();
    let reporter = Reporter { callback: progress };
    reporter.stage(RenderStage::Preparing, 0, 0, 0.0);

    match run_job(job, runner, &reporter) {
        Ok(()) => {
            reporter.stage(RenderStage::Complete, 0, 0, 1.0);
            tracing::info!(
                elapsed_secs = started.elapsed().as_secs_f64(),
                output = %job.output.display(),
                "Render finished"
            );
            Ok(job.output.clone())
        }
        Err(err) => {
            reporter.stage(RenderStage::Failed, 0, 0, 0.0);
            tracing::error!(error = %err, output = %job.output.display(), "Render failed");
            Err(err)
        }
    }
}

fn run_job(job: &RenderJob, runner: &dyn ProcessRunner, reporter: &Reporter<'_>) -> RenderResult<()> {
    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let emitter = FilterGraphEmitter::new(job.config.clone());
    match emitter.strategy_for(&job.timeline) {
        RenderStrategy::SinglePass => {
            let invocation = emitter.compile_single_pass(&job.timeline, &job.output)?;
            run_step(runner, &invocation, reporter, RenderStage::Rendering, 1, 1)
        }
        RenderStrategy::PerClipThenConcat => {
            std::fs::create_dir_all(&job.temp_root)?;
            // Dropping the directory removes it, on success and on failure.
            let work_dir = tempfile::Builder::new()
                .prefix(&format!("{WORK_DIR_PREFIX}{}", short_id()))
                .rand_bytes(0)
                .tempdir_in(&job.temp_root)?;
            let plan = emitter.compile_batch(&job.timeline, &job.output, work_dir.path())?;
            run_batch(runner, &plan, reporter)
        }
    }
}

/// Execute a compiled plan. Batch plans must point at an existing work
/// directory; the caller owns its cleanup.
pub fn execute_plan(
    runner: &dyn ProcessRunner,
    plan: &RenderPlan,
    progress: Option<&ProgressCallback>,
) -> RenderResult<()> {
    let reporter = Reporter { callback: progress };
    match plan {
        RenderPlan::SinglePass(invocation) => {
            run_step(runner, invocation, &reporter, RenderStage::Rendering, 1, 1)
        }
        RenderPlan::Batch(batch) => run_batch(runner, batch, &reporter),
    }
}

fn run_batch(runner: &dyn ProcessRunner, plan: &BatchPlan, reporter: &Reporter<'_>) -> RenderResult<()> {
    let steps = plan.invocation_count();
    tracing::info!(
        clips = plan.clip_renders.len(),
        work_dir = %plan.work_dir.display(),
        "Rendering clip by clip"
    );

    for (index, clip) in plan.clip_renders.iter().enumerate() {
        run_step(runner, clip, reporter, RenderStage::RenderingClip, index + 1, steps)?;
    }

    std::fs::write(&plan.concat_list, &plan.concat_list_contents)?;
    let mut step = plan.clip_renders.len() + 1;
    run_step(runner, &plan.concat, reporter, RenderStage::Concatenating, step, steps)?;

    match &plan.finish {
        BatchFinish::Mix(mix) => {
            step += 1;
            run_step(runner, mix, reporter, RenderStage::Mixing, step, steps)?;
        }
        BatchFinish::Copy { from, to } => {
            reporter.stage(RenderStage::Finalizing, step, steps, 1.0);
            std::fs::copy(from, to)?;
        }
    }
    Ok(())
}

fn run_step(
    runner: &dyn ProcessRunner,
    invocation: &FfmpegInvocation,
    reporter: &Reporter<'_>,
    stage: RenderStage,
    step: usize,
    steps: usize,
) -> RenderResult<()> {
    tracing::debug!(step, steps, stage = ?stage, output = %invocation.output.display(), "Render step");
    reporter.stage(stage, step, steps, (step - 1) as f64 / steps as f64);
    runner.run(invocation, &|p: ProcessProgress| {
        reporter.emit(RenderProgress {
            stage,
            step,
            steps,
            progress: ((step - 1) as f64 + p.progress) / steps as f64,
            eta_secs: p.eta_secs,
        });
    })
}

struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl Reporter<'_> {
    fn emit(&self, report: RenderProgress) {
        if let Some(cb) = self.callback {
            cb(report);
        }
    }

    fn stage(&self, stage: RenderStage, step: usize, steps: usize, progress: f64) {
        self.emit(RenderProgress {
            stage,
            step,
            steps,
            progress,
            eta_secs: 0.0,
        });
    }
}

/// Eight hex digits, unique enough for concurrent renders sharing a root.
fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
