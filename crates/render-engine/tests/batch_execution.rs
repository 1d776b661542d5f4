use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reelweave_common::error::{RenderError, RenderResult};
use reelweave_render_engine::filtergraph::{FfmpegInvocation, FilterGraphConfig, CONCAT_LIST_FILE};
use reelweave_render_engine::render::{
    render_blocking, render_timeline, ProgressCallback, RenderJob, RenderStage,
};
use reelweave_render_engine::runner::{ProcessProgress, ProcessRunner};
use reelweave_timeline_model::builder::SourceClip;
use reelweave_timeline_model::timeline::Timeline;
use reelweave_weaver::{TransitionAsset, TransitionWeaver, WeaverConfig};

/// Records every invocation and writes a placeholder output file, the way
/// a successful encoder run would.
#[derive(Default)]
struct FakeRunner {
    runs: Mutex<Vec<FfmpegInvocation>>,
    concat_lists: Mutex<Vec<String>>,
    fail_on: Option<String>,
    unavailable: bool,
}

impl FakeRunner {
    fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    fn outputs(&self) -> Vec<String> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .map(|run| run.output.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        invocation: &FfmpegInvocation,
        progress: &dyn Fn(ProcessProgress),
    ) -> RenderResult<()> {
        self.runs.lock().unwrap().push(invocation.clone());

        for input in &invocation.inputs {
            if input.path.file_name().is_some_and(|name| name == CONCAT_LIST_FILE) {
                let contents = std::fs::read_to_string(&input.path)?;
                self.concat_lists.lock().unwrap().push(contents);
            }
        }

        let name = invocation.output.file_name().unwrap().to_string_lossy();
        if self.fail_on.as_deref() == Some(name.as_ref()) {
            return Err(RenderError::external_process(
                "ffmpeg",
                Some(1),
                "Conversion failed!",
            ));
        }

        for fraction in [0.5, 1.0] {
            progress(ProcessProgress {
                progress: fraction,
                out_time_secs: invocation.expected_duration_secs * fraction,
                eta_secs: 0.0,
                complete: fraction >= 1.0,
            });
        }
        std::fs::write(&invocation.output, b"encoded")?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn name(&self) -> &str {
        "fake-ffmpeg"
    }
}

fn woven(count: usize, with_transition: bool) -> Timeline {
    let config = WeaverConfig {
        pre_overlap_secs: 0.4,
        gap_secs: 0.2,
        logo_path: PathBuf::from("/channel/logo.png"),
        transition: with_transition.then(|| TransitionAsset {
            path: PathBuf::from("/channel/transition.mov"),
            duration_secs: 1.0,
        }),
        ..WeaverConfig::default()
    };
    let sources: Vec<SourceClip> = (0..count)
        .map(|i| SourceClip::new(format!("/clips/{i:02}.mp4"), 2.0 + (i % 3) as f64))
        .collect();
    TransitionWeaver::new(config).weave(&sources).unwrap()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
}

fn recording_callback() -> (ProgressCallback, Arc<Mutex<Vec<(RenderStage, f64)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Box::new(move |report| {
        sink.lock().unwrap().push((report.stage, report.progress));
    });
    (callback, seen)
}

#[test]
fn batch_render_without_tracks_copies_the_joined_file() {
    let dir = tempfile::tempdir().unwrap();
    let temp_root = dir.path().join("tmp");
    let output = dir.path().join("out").join("video.mp4");
    let job = RenderJob::new(woven(12, false), &output, &temp_root);
    let runner = FakeRunner::default();

    let rendered = render_blocking(&job, &runner, None).unwrap();

    assert_eq!(rendered, output);
    assert!(output.exists());
    assert_eq!(entries(&temp_root), 0, "scratch directory is removed");

    let outputs = runner.outputs();
    assert_eq!(outputs.len(), 13);
    assert_eq!(outputs[0], "clip_0000.mp4");
    assert_eq!(outputs[11], "clip_0011.mp4");
    assert_eq!(outputs[12], "concat_video.mp4");

    let lists = runner.concat_lists.lock().unwrap();
    assert_eq!(lists.len(), 1);
    let lines: Vec<&str> = lists[0].lines().collect();
    assert_eq!(lines.len(), 12);
    assert!(lines[0].starts_with("file '"));
    assert!(lines[0].contains("ffmpeg_render_"));
    assert!(lines[0].ends_with("clip_0000.mp4'"));
}

#[test]
fn batch_render_with_tracks_ends_with_a_mix_pass() {
    let dir = tempfile::tempdir().unwrap();
    let temp_root = dir.path().join("tmp");
    let output = dir.path().join("video.mp4");
    let job = RenderJob::new(woven(3, true), &output, &temp_root).with_config(FilterGraphConfig {
        batch_threshold: 2,
        ..FilterGraphConfig::default()
    });
    let runner = FakeRunner::default();

    render_blocking(&job, &runner, None).unwrap();

    let runs = runner.runs.lock().unwrap();
    assert_eq!(runs.len(), 5 + 1 + 1);
    let mix = runs.last().unwrap();
    assert_eq!(mix.output, output);
    assert_eq!(mix.maps, ["0:v", "[final_audio]"]);
    assert!(mix.inputs[0].path.ends_with("concat_video.mp4"));
    assert!(output.exists());
    assert_eq!(entries(&temp_root), 0);
}

#[test]
fn failed_clip_aborts_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let temp_root = dir.path().join("tmp");
    let output = dir.path().join("video.mp4");
    let job = RenderJob::new(woven(12, false), &output, &temp_root);
    let runner = FakeRunner::failing_on("clip_0003.mp4");
    let (callback, seen) = recording_callback();

    let err = render_blocking(&job, &runner, Some(&callback)).unwrap_err();

    assert!(matches!(err, RenderError::ExternalProcess { code: Some(1), .. }));
    assert_eq!(err.exit_code(), Some(1));
    assert_eq!(runner.outputs().len(), 4, "no clip after the failing one runs");
    assert!(runner.concat_lists.lock().unwrap().is_empty());
    assert!(!output.exists());
    assert_eq!(entries(&temp_root), 0);
    assert_eq!(seen.lock().unwrap().last().map(|(stage, _)| *stage), Some(RenderStage::Failed));
}

#[test]
fn unusable_scratch_root_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let temp_root = dir.path().join("tmp");
    std::fs::write(&temp_root, b"not a directory").unwrap();
    let job = RenderJob::new(woven(12, false), dir.path().join("video.mp4"), &temp_root);
    let runner = FakeRunner::default();
    let (callback, seen) = recording_callback();

    assert!(render_blocking(&job, &runner, Some(&callback)).is_err());

    assert!(runner.outputs().is_empty());
    let stages: Vec<RenderStage> = seen.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(stages, vec![RenderStage::Preparing, RenderStage::Failed]);
}

#[test]
fn progress_walks_through_batch_stages() {
    let dir = tempfile::tempdir().unwrap();
    let job = RenderJob::new(woven(11, false), dir.path().join("video.mp4"), dir.path().join("tmp"));
    let runner = FakeRunner::default();
    let (callback, seen) = recording_callback();

    render_blocking(&job, &runner, Some(&callback)).unwrap();

    let seen = seen.lock().unwrap();
    let mut stages: Vec<RenderStage> = seen.iter().map(|(stage, _)| *stage).collect();
    stages.dedup();
    assert_eq!(
        stages,
        vec![
            RenderStage::Preparing,
            RenderStage::RenderingClip,
            RenderStage::Concatenating,
            RenderStage::Finalizing,
            RenderStage::Complete,
        ]
    );
    let fractions: Vec<f64> = seen.iter().map(|(_, progress)| *progress).collect();
    assert!(fractions.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[test]
fn single_pass_render_runs_once_without_scratch_space() {
    let dir = tempfile::tempdir().unwrap();
    let temp_root = dir.path().join("tmp");
    let job = RenderJob::new(woven(2, true), dir.path().join("video.mp4"), &temp_root);
    let runner = FakeRunner::default();
    let (callback, seen) = recording_callback();

    render_blocking(&job, &runner, Some(&callback)).unwrap();

    assert_eq!(runner.outputs(), vec!["video.mp4"]);
    assert!(!temp_root.exists());
    let mut stages: Vec<RenderStage> = seen.lock().unwrap().iter().map(|(s, _)| *s).collect();
    stages.dedup();
    assert_eq!(
        stages,
        vec![RenderStage::Preparing, RenderStage::Rendering, RenderStage::Complete]
    );
}

#[tokio::test]
async fn unavailable_encoder_is_reported_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let job = RenderJob::new(woven(2, false), dir.path().join("video.mp4"), dir.path().join("tmp"));
    let runner = Arc::new(FakeRunner {
        unavailable: true,
        ..FakeRunner::default()
    });

    let err = render_timeline(job, runner.clone(), None).await.unwrap_err();

    assert!(matches!(err, RenderError::Unsupported { .. }));
    assert!(err.to_string().contains("fake-ffmpeg"));
    assert!(runner.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn async_render_resolves_to_the_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("video.mp4");
    let job = RenderJob::new(woven(3, true), &output, dir.path().join("tmp"));
    let runner = Arc::new(FakeRunner::default());

    let rendered = render_timeline(job, runner.clone(), None).await.unwrap();

    assert_eq!(rendered, output);
    assert_eq!(runner.runs.lock().unwrap().len(), 1);
}
