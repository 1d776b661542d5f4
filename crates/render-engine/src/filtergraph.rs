//! Lowering a timeline into ffmpeg filter graphs and invocation plans.
//!
//! Two strategies produce equivalent output:
//!
//! - **Single pass:** one `filter_complex` covering every clip, a concat
//!   node, and the audio-track mix.
//! - **Per clip, then concat:** each clip is encoded on its own with the
//!   same clip graph, the intermediates are joined by stream copy, and the
//!   audio tracks are mixed in a second pass over the joined file.
//!
//! The batch strategy kicks in when the clip count exceeds the configured
//! threshold, bounding graph size and encoder memory.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reelweave_common::config::RenderDefaults;
use reelweave_common::error::RenderResult;
use reelweave_timeline_model::builder::GAP_FILL_COLOR;
use reelweave_timeline_model::layer::{
    ImageOverlayLayer, MainVideoLayer, OverlayPosition, ResizeMode, TransitionOverlayLayer,
};
use reelweave_timeline_model::timeline::{AudioTrack, Clip, ContentLayer, RenderParams, Timeline};

use crate::encode::EncoderSettings;

/// Clip count above which the batch strategy is used.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

/// Sample format every audio stream is normalized to before concat.
const AUDIO_SAMPLE_RATE: u32 = 44_100;
const AUDIO_FORMAT: &str = "aformat=sample_rates=44100:channel_layouts=stereo";

/// Box blur radius at blur strength 1.0.
const BOXBLUR_RADIUS_PER_UNIT: f64 = 80.0;
const BOXBLUR_POWER: u32 = 10;

pub const CONCAT_LIST_FILE: &str = "concat_list.txt";
pub const CONCAT_VIDEO_FILE: &str = "concat_video.mp4";

/// How a timeline is turned into encoder invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    SinglePass,
    PerClipThenConcat,
}

/// Pick the strategy for `clip_count` clips.
pub fn select_strategy(clip_count: usize, threshold: usize) -> RenderStrategy {
    if clip_count > threshold {
        RenderStrategy::PerClipThenConcat
    } else {
        RenderStrategy::SinglePass
    }
}

/// Deduplicated list of encoder inputs: first use of a path allocates
/// the next index, later uses reuse it.
#[derive(Debug, Default)]
pub struct InputRegistry {
    inputs: Vec<MediaInput>,
    index: HashMap<PathBuf, usize>,
}

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub options: Vec<String>,
    pub path: PathBuf,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&mut self, path: &Path) -> usize {
        if let Some(index) = self.index.get(path) {
            return *index;
        }
        let index = self.inputs.len();
        self.inputs.push(MediaInput {
            options: Vec::new(),
            path: path.to_path_buf(),
        });
        self.index.insert(path.to_path_buf(), index);
        index
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn into_inputs(self) -> Vec<MediaInput> {
        self.inputs
    }
}

/// A complete encoder command line, minus the program name.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInvocation {
    pub inputs: Vec<MediaInput>,
    pub filter_script: Option<String>,
    pub maps: Vec<String>,
    pub codec_args: Vec<String>,
    pub output: PathBuf,
    /// Length of the output, used for progress reporting.
    pub expected_duration_secs: f64,
}

impl FfmpegInvocation {
    /// Argument vector: `-y`, inputs, filter graph, maps, codec options,
    /// output path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.display().to_string());
        }
        if let Some(script) = &self.filter_script {
            args.push("-filter_complex".to_string());
            args.push(script.clone());
        }
        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }
        args.extend(self.codec_args.iter().cloned());
        args.push(self.output.display().to_string());
        args
    }

    /// Shell-quoted command line for logs and dry runs.
    pub fn command_line(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The intermediate files and passes of a batch render.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub work_dir: PathBuf,
    pub clip_renders: Vec<FfmpegInvocation>,
    pub concat_list: PathBuf,
    pub concat_list_contents: String,
    pub concat: FfmpegInvocation,
    pub finish: BatchFinish,
}

/// Last step of a batch render.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchFinish {
    /// Mix the audio tracks over the joined file.
    Mix(FfmpegInvocation),
    /// No audio tracks: the joined file is the result.
    Copy { from: PathBuf, to: PathBuf },
}

/// Everything needed to produce one output file.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    SinglePass(FfmpegInvocation),
    Batch(BatchPlan),
}

impl RenderPlan {
    pub fn strategy(&self) -> RenderStrategy {
        match self {
            Self::SinglePass(_) => RenderStrategy::SinglePass,
            Self::Batch(_) => RenderStrategy::PerClipThenConcat,
        }
    }

    /// Number of encoder runs the plan needs.
    pub fn invocation_count(&self) -> usize {
        match self {
            Self::SinglePass(_) => 1,
            Self::Batch(batch) => batch.invocation_count(),
        }
    }
}

impl BatchPlan {
    /// Clip encodes, the concat pass, and the mix pass if there is one.
    pub fn invocation_count(&self) -> usize {
        self.clip_renders.len() + 1 + usize::from(matches!(self.finish, BatchFinish::Mix(_)))
    }
}

/// Configuration for the filter-graph emitter.
#[derive(Debug, Clone)]
pub struct FilterGraphConfig {
    pub encoder: EncoderSettings,
    pub batch_threshold: usize,
}

impl Default for FilterGraphConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderSettings::default(),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
        }
    }
}

impl FilterGraphConfig {
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            encoder: EncoderSettings::from_defaults(defaults),
            batch_threshold: defaults.batch_threshold,
        }
    }
}

/// Lowers timelines into ffmpeg invocations.
pub struct FilterGraphEmitter {
    config: FilterGraphConfig,
}

impl FilterGraphEmitter {
    pub fn new(config: FilterGraphConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FilterGraphConfig::default())
    }

    pub fn config(&self) -> &FilterGraphConfig {
        &self.config
    }

    pub fn strategy_for(&self, timeline: &Timeline) -> RenderStrategy {
        select_strategy(timeline.clips().len(), self.config.batch_threshold)
    }

    /// Compile `timeline` with the strategy its size calls for.
    /// `work_dir` is only used by the batch strategy.
    pub fn compile(
        &self,
        timeline: &Timeline,
        output: &Path,
        work_dir: &Path,
    ) -> RenderResult<RenderPlan> {
        timeline.validate()?;
        let strategy = self.strategy_for(timeline);
        tracing::info!(
            clips = timeline.clips().len(),
            audio_tracks = timeline.audio_tracks().len(),
            threshold = self.config.batch_threshold,
            strategy = ?strategy,
            "Compiling filter graph"
        );
        match strategy {
            RenderStrategy::SinglePass => {
                Ok(RenderPlan::SinglePass(self.single_pass(timeline, output)))
            }
            RenderStrategy::PerClipThenConcat => {
                Ok(RenderPlan::Batch(self.batch(timeline, output, work_dir)))
            }
        }
    }

    /// One graph for the whole timeline.
    pub fn compile_single_pass(
        &self,
        timeline: &Timeline,
        output: &Path,
    ) -> RenderResult<FfmpegInvocation> {
        timeline.validate()?;
        Ok(self.single_pass(timeline, output))
    }

    /// Per-clip encodes, a stream-copy concat, and an audio mix pass.
    pub fn compile_batch(
        &self,
        timeline: &Timeline,
        output: &Path,
        work_dir: &Path,
    ) -> RenderResult<BatchPlan> {
        timeline.validate()?;
        Ok(self.batch(timeline, output, work_dir))
    }

    fn single_pass(&self, timeline: &Timeline, output: &Path) -> FfmpegInvocation {
        let params = timeline.params();
        let mut inputs = InputRegistry::new();
        let mut graph = FilterGraph::default();

        let mut segments = String::new();
        for (index, clip) in timeline.clips().iter().enumerate() {
            let pads = emit_clip(&mut graph, &mut inputs, clip, index, params);
            let _ = write!(segments, "[{}][{}]", pads.video, pads.audio);
        }
        graph.push(format!(
            "{segments}concat=n={}:v=1:a=1[main_video][main_audio_raw]",
            timeline.clips().len()
        ));

        emit_audio_mix(
            &mut graph,
            &mut inputs,
            "main_audio_raw",
            timeline.audio_tracks(),
            "final_audio",
        );

        let mut codec_args = self.config.encoder.video_args();
        codec_args.extend(self.config.encoder.audio_args());
        codec_args.extend(["-r".to_string(), params.fps.to_string()]);

        FfmpegInvocation {
            inputs: inputs.into_inputs(),
            filter_script: Some(graph.script()),
            maps: vec!["[main_video]".to_string(), "[final_audio]".to_string()],
            codec_args,
            output: output.to_path_buf(),
            expected_duration_secs: timeline.total_duration(),
        }
    }

    fn batch(&self, timeline: &Timeline, output: &Path, work_dir: &Path) -> BatchPlan {
        let params = timeline.params();

        let clip_renders: Vec<FfmpegInvocation> = timeline
            .clips()
            .iter()
            .enumerate()
            .map(|(index, clip)| self.clip_render(clip, index, params, work_dir))
            .collect();

        let mut concat_list_contents = String::new();
        for render in &clip_renders {
            let _ = writeln!(
                concat_list_contents,
                "file '{}'",
                render.output.display().to_string().replace('\'', "'\\''")
            );
        }

        let concat_list = work_dir.join(CONCAT_LIST_FILE);
        let concat_video = work_dir.join(CONCAT_VIDEO_FILE);
        let concat = FfmpegInvocation {
            inputs: vec![MediaInput {
                options: ["-f", "concat", "-safe", "0"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                path: concat_list.clone(),
            }],
            filter_script: None,
            maps: Vec::new(),
            codec_args: vec!["-c".to_string(), "copy".to_string()],
            output: concat_video.clone(),
            expected_duration_secs: timeline.total_duration(),
        };

        let finish = if timeline.audio_tracks().is_empty() {
            BatchFinish::Copy {
                from: concat_video,
                to: output.to_path_buf(),
            }
        } else {
            let mut inputs = InputRegistry::new();
            let main = inputs.index_of(&concat_video);
            let mut graph = FilterGraph::default();
            emit_audio_mix(
                &mut graph,
                &mut inputs,
                &format!("{main}:a"),
                timeline.audio_tracks(),
                "final_audio",
            );
            let mut codec_args = vec!["-c:v".to_string(), "copy".to_string()];
            codec_args.extend(self.config.encoder.audio_args());
            BatchFinish::Mix(FfmpegInvocation {
                inputs: inputs.into_inputs(),
                filter_script: Some(graph.script()),
                maps: vec![format!("{main}:v"), "[final_audio]".to_string()],
                codec_args,
                output: output.to_path_buf(),
                expected_duration_secs: timeline.total_duration(),
            })
        };

        BatchPlan {
            work_dir: work_dir.to_path_buf(),
            clip_renders,
            concat_list,
            concat_list_contents,
            concat,
            finish,
        }
    }

    fn clip_render(
        &self,
        clip: &Clip,
        index: usize,
        params: &RenderParams,
        work_dir: &Path,
    ) -> FfmpegInvocation {
        let mut inputs = InputRegistry::new();
        let mut graph = FilterGraph::default();
        let pads = emit_clip(&mut graph, &mut inputs, clip, index, params);

        let mut codec_args = self.config.encoder.video_args();
        codec_args.extend(self.config.encoder.audio_args());
        codec_args.extend(["-r".to_string(), params.fps.to_string()]);

        FfmpegInvocation {
            inputs: inputs.into_inputs(),
            filter_script: Some(graph.script()),
            maps: vec![format!("[{}]", pads.video), format!("[{}]", pads.audio)],
            codec_args,
            output: work_dir.join(format!("clip_{index:04}.mp4")),
            expected_duration_secs: clip.duration(),
        }
    }
}

/// Ordered filter chains, joined with `;`.
#[derive(Debug, Default)]
struct FilterGraph {
    chains: Vec<String>,
}

impl FilterGraph {
    fn push(&mut self, chain: String) {
        self.chains.push(chain);
    }

    fn script(&self) -> String {
        self.chains.join(";")
    }
}

/// Output pad labels of one clip, without brackets.
struct ClipPads {
    video: String,
    audio: String,
}

/// Emit the chains of one clip. Pads are prefixed with `c{index}_` so
/// several clips can share a graph.
fn emit_clip(
    graph: &mut FilterGraph,
    inputs: &mut InputRegistry,
    clip: &Clip,
    index: usize,
    params: &RenderParams,
) -> ClipPads {
    let prefix = format!("c{index}");
    let duration = fmt_secs(clip.duration());
    let audio_pad = format!("{prefix}_a");
    let base_pad = format!("{prefix}_base");
    let (w, h) = (params.width, params.height);

    match clip.content() {
        Some(ContentLayer::Video(video)) => {
            let input = inputs.index_of(&video.path);
            emit_main_video(graph, input, video, &prefix, &base_pad, params);
            if params.keep_source_audio {
                graph.push(format!(
                    "[{input}:a]atrim=start={}:end={},asetpts=PTS-STARTPTS,{AUDIO_FORMAT}[{audio_pad}]",
                    fmt_secs(video.cut_from),
                    fmt_secs(video.cut_to)
                ));
            } else {
                graph.push(silence(&duration, &audio_pad));
            }
        }
        Some(ContentLayer::Fill(fill)) => {
            graph.push(format!(
                "color=c={}:s={w}x{h}:d={duration}[{base_pad}]",
                fill.color
            ));
            graph.push(silence(&duration, &audio_pad));
        }
        None => {
            graph.push(format!(
                "color=c={GAP_FILL_COLOR}:s={w}x{h}:d={duration}[{base_pad}]"
            ));
            graph.push(silence(&duration, &audio_pad));
        }
    }

    let mut current = base_pad;
    for (k, logo) in clip.image_overlays().enumerate() {
        let logo_pad = format!("{prefix}_logo{k}");
        let next = format!("{prefix}_l{k}");
        emit_image_overlay(graph, inputs.index_of(&logo.path), logo, &current, &logo_pad, &next, params);
        current = next;
    }

    for (k, overlay) in clip.transition_overlays().enumerate() {
        let overlay_pad = format!("{prefix}_t{k}");
        let next = format!("{prefix}_tv{k}");
        emit_transition_overlay(
            graph,
            inputs.index_of(&overlay.path),
            overlay,
            &current,
            &overlay_pad,
            &next,
            params,
        );
        current = next;
    }

    let video_pad = format!("{prefix}_v");
    graph.push(format!("[{current}]setsar=1,fps={}[{video_pad}]", params.fps));

    ClipPads {
        video: video_pad,
        audio: audio_pad,
    }
}

fn emit_main_video(
    graph: &mut FilterGraph,
    input: usize,
    video: &MainVideoLayer,
    prefix: &str,
    base_pad: &str,
    params: &RenderParams,
) {
    let (w, h) = (params.width, params.height);
    let raw = format!("{prefix}_raw");
    graph.push(format!(
        "[{input}:v]trim=start={}:end={},setpts=PTS-STARTPTS[{raw}]",
        fmt_secs(video.cut_from),
        fmt_secs(video.cut_to)
    ));

    let fill = format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}");
    match video.resize_mode {
        ResizeMode::Crop => graph.push(format!("[{raw}]{fill}[{base_pad}]")),
        ResizeMode::ContainBlur => {
            let blur = video
                .blur
                .and_then(|strength| boxblur_radius(strength, w, h))
                .map(|radius| format!(",boxblur={radius}:{BOXBLUR_POWER}"))
                .unwrap_or_default();
            graph.push(format!(
                "[{raw}]split=2[{prefix}_bg][{prefix}_fg];\
                 [{prefix}_bg]{fill}{blur}[{prefix}_bgb];\
                 [{prefix}_fg]scale={w}:{h}:force_original_aspect_ratio=decrease[{prefix}_fgs];\
                 [{prefix}_bgb][{prefix}_fgs]overlay=(W-w)/2:(H-h)/2[{base_pad}]"
            ));
        }
    }
}

/// Box blur radius for a blur strength. Strengths in `(0, 1]` scale the
/// unit radius, larger ones are a radius already. ffmpeg caps the radius
/// at half the smallest plane, which for 4:2:0 chroma is a quarter of the
/// frame's short side.
fn boxblur_radius(strength: f64, width: u32, height: u32) -> Option<u32> {
    if strength.is_nan() || strength <= 0.0 {
        return None;
    }
    let radius = if strength <= 1.0 {
        ((strength * BOXBLUR_RADIUS_PER_UNIT).round() as u32).max(1)
    } else {
        strength.round() as u32
    };
    let limit = (width.min(height) / 4).max(1);
    Some(radius.min(limit))
}

fn emit_image_overlay(
    graph: &mut FilterGraph,
    input: usize,
    layer: &ImageOverlayLayer,
    current: &str,
    layer_pad: &str,
    next: &str,
    params: &RenderParams,
) {
    let (w, h) = (params.width, params.height);
    graph.push(format!(
        "[{input}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,format=yuva420p[{layer_pad}]"
    ));
    graph.push(format!(
        "[{current}][{layer_pad}]overlay={}[{next}]",
        overlay_position(layer.position)
    ));
}

fn emit_transition_overlay(
    graph: &mut FilterGraph,
    input: usize,
    layer: &TransitionOverlayLayer,
    current: &str,
    layer_pad: &str,
    next: &str,
    params: &RenderParams,
) {
    let (w, h) = (params.width, params.height);
    let start = fmt_secs(layer.window_start);
    let stop = fmt_secs(layer.window_stop);
    graph.push(format!(
        "[{input}:v]trim=start={}:end={},setpts=PTS-STARTPTS,scale={w}:{h},setpts=PTS+{start}/TB[{layer_pad}]",
        fmt_secs(layer.source_cut_from),
        fmt_secs(layer.source_cut_to)
    ));
    graph.push(format!(
        "[{current}][{layer_pad}]overlay=0:0:eof_action=pass:enable='gte(t,{start})*lt(t,{stop})'[{next}]"
    ));
}

/// Mix `tracks` into `main_pad`, writing `out_pad`. Tracks that share a
/// source path are merged first so the final mix has one input per file.
fn emit_audio_mix(
    graph: &mut FilterGraph,
    inputs: &mut InputRegistry,
    main_pad: &str,
    tracks: &[AudioTrack],
    out_pad: &str,
) {
    if tracks.is_empty() {
        graph.push(format!("[{main_pad}]acopy[{out_pad}]"));
        return;
    }

    let mut groups: Vec<(&Path, Vec<&AudioTrack>)> = Vec::new();
    for track in tracks {
        match groups.iter_mut().find(|(path, _)| *path == track.path.as_path()) {
            Some((_, members)) => members.push(track),
            None => groups.push((track.path.as_path(), vec![track])),
        }
    }

    let mut mix_inputs = format!("[{main_pad}]");
    for (g, (path, members)) in groups.iter().enumerate() {
        let input = inputs.index_of(path);
        let group_pad = format!("at{g}");
        if let [track] = members.as_slice() {
            graph.push(track_chain(input, track, &group_pad));
        } else {
            let mut parts = String::new();
            for (k, track) in members.iter().enumerate() {
                let part_pad = format!("at{g}p{k}");
                graph.push(track_chain(input, track, &part_pad));
                let _ = write!(parts, "[{part_pad}]");
            }
            graph.push(format!(
                "{parts}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[{group_pad}]",
                members.len()
            ));
        }
        let _ = write!(mix_inputs, "[{group_pad}]");
    }

    graph.push(format!(
        "{mix_inputs}amix=inputs={}:duration=first:dropout_transition=0:normalize=0[{out_pad}]",
        groups.len() + 1
    ));
}

fn track_chain(input: usize, track: &AudioTrack, pad: &str) -> String {
    let delay_ms = (track.global_start * 1000.0).round() as u64;
    format!(
        "[{input}:a]atrim=start={}:end={},asetpts=PTS-STARTPTS,{AUDIO_FORMAT},volume={},adelay={delay_ms}|{delay_ms}[{pad}]",
        fmt_secs(track.cut_from),
        fmt_secs(track.cut_to),
        fmt_secs(track.mix_volume)
    )
}

fn silence(duration: &str, pad: &str) -> String {
    format!("anullsrc=cl=stereo:r={AUDIO_SAMPLE_RATE}:d={duration}[{pad}]")
}

fn overlay_position(position: OverlayPosition) -> &'static str {
    match position {
        OverlayPosition::Center => "(W-w)/2:(H-h)/2",
        OverlayPosition::TopLeft => "0:0",
        OverlayPosition::TopRight => "W-w:0",
        OverlayPosition::BottomLeft => "0:H-h",
        OverlayPosition::BottomRight => "W-w:H-h",
    }
}

/// Seconds with up to six decimals and no trailing zeros.
pub fn fmt_secs(secs: f64) -> String {
    let text = format!("{secs:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelweave_timeline_model::builder::{build_gap_clip, build_main_clip, SourceClip};
    use reelweave_timeline_model::layer::{Layer, TransitionRole};

    fn params() -> RenderParams {
        RenderParams::default()
    }

    fn two_clip_timeline(tracks: Vec<AudioTrack>) -> Timeline {
        let logo = Path::new("logo.png");
        let clips = vec![
            build_main_clip(&SourceClip::new("a.mp4", 5.0), logo, 0.25),
            build_gap_clip(0.2, logo),
        ];
        Timeline::new(params(), clips, tracks).unwrap()
    }

    fn track(path: &str, start: f64) -> AudioTrack {
        AudioTrack {
            path: PathBuf::from(path),
            cut_from: 0.0,
            cut_to: 1.0,
            global_start: start,
            mix_volume: 1.0,
        }
    }

    #[test]
    fn test_select_strategy_threshold_is_exclusive() {
        assert_eq!(select_strategy(10, 10), RenderStrategy::SinglePass);
        assert_eq!(select_strategy(11, 10), RenderStrategy::PerClipThenConcat);
        assert_eq!(select_strategy(1, 0), RenderStrategy::PerClipThenConcat);
    }

    #[test]
    fn test_input_registry_dedups_paths() {
        let mut inputs = InputRegistry::new();
        assert_eq!(inputs.index_of(Path::new("a.mp4")), 0);
        assert_eq!(inputs.index_of(Path::new("logo.png")), 1);
        assert_eq!(inputs.index_of(Path::new("a.mp4")), 0);
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn test_fmt_secs() {
        assert_eq!(fmt_secs(5.0), "5");
        assert_eq!(fmt_secs(4.6), "4.6");
        assert_eq!(fmt_secs(0.0), "0");
        assert_eq!(fmt_secs(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_secs(-0.0000001), "0");
    }

    #[test]
    fn test_contain_blur_clip_chain() {
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        let clip = build_main_clip(&SourceClip::new("a.mp4", 5.0), Path::new("logo.png"), 0.25);
        let pads = emit_clip(&mut graph, &mut inputs, &clip, 3, &params());
        let script = graph.script();

        assert_eq!(pads.video, "c3_v");
        assert_eq!(pads.audio, "c3_a");
        assert!(script.starts_with("[0:v]trim=start=0:end=5,setpts=PTS-STARTPTS[c3_raw]"));
        assert!(script.contains("crop=1920:1080,boxblur=20:10[c3_bgb]"));
        assert!(script.contains("[c3_bgb][c3_fgs]overlay=(W-w)/2:(H-h)/2[c3_base]"));
        assert!(script.contains("[1:v]scale=1920:1080:force_original_aspect_ratio=decrease,format=yuva420p[c3_logo0]"));
        assert!(script.contains("[0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS"));
        assert!(script.ends_with("[c3_l0]setsar=1,fps=30[c3_v]"));
    }

    #[test]
    fn test_blur_above_one_is_an_absolute_radius() {
        let mut clip = build_main_clip(&SourceClip::new("a.mp4", 5.0), Path::new("logo.png"), 20.0);
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        emit_clip(&mut graph, &mut inputs, &clip, 0, &params());
        assert!(graph.script().contains("crop=1920:1080,boxblur=20:10[c0_bgb]"));

        if let Some(Layer::MainVideo(video)) = clip.layers.first_mut() {
            video.blur = Some(5000.0);
        }
        let mut graph = FilterGraph::default();
        emit_clip(&mut graph, &mut inputs, &clip, 0, &params());
        assert!(graph.script().contains("boxblur=270:10"));
    }

    #[test]
    fn test_boxblur_radius_bounds() {
        assert_eq!(boxblur_radius(0.0, 1920, 1080), None);
        assert_eq!(boxblur_radius(f64::NAN, 1920, 1080), None);
        assert_eq!(boxblur_radius(0.001, 1920, 1080), Some(1));
        assert_eq!(boxblur_radius(1.0, 1920, 1080), Some(80));
        assert_eq!(boxblur_radius(1.4, 1920, 1080), Some(1));
        assert_eq!(boxblur_radius(20.0, 1920, 1080), Some(20));
        assert_eq!(boxblur_radius(1.0, 1080, 1920), Some(80));
        assert_eq!(boxblur_radius(1.0, 240, 160), Some(40));
    }

    #[test]
    fn test_crop_mode_and_muted_source() {
        let mut clip = build_main_clip(&SourceClip::new("a.mp4", 2.5), Path::new("logo.png"), 0.0);
        if let Some(Layer::MainVideo(video)) = clip.layers.first_mut() {
            video.resize_mode = ResizeMode::Crop;
        }
        let muted = RenderParams {
            keep_source_audio: false,
            ..params()
        };
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        emit_clip(&mut graph, &mut inputs, &clip, 0, &muted);
        let script = graph.script();
        assert!(script.contains("[c0_raw]scale=1920:1080:force_original_aspect_ratio=increase,crop=1920:1080[c0_base]"));
        assert!(!script.contains("split=2"));
        assert!(!script.contains("[0:a]"));
        assert!(script.contains("anullsrc=cl=stereo:r=44100:d=2.5[c0_a]"));
    }

    #[test]
    fn test_gap_clip_synthesizes_color_and_silence() {
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        emit_clip(&mut graph, &mut inputs, &build_gap_clip(0.2, Path::new("logo.png")), 1, &params());
        let script = graph.script();
        assert!(script.starts_with("color=c=#000000:s=1920x1080:d=0.2[c1_base];anullsrc=cl=stereo:r=44100:d=0.2[c1_a]"));
        assert_eq!(inputs.len(), 1);
    }

    #[test]
    fn test_transition_overlay_is_time_gated() {
        let mut clip = build_main_clip(&SourceClip::new("a.mp4", 5.0), Path::new("logo.png"), 0.25);
        clip.push_layer(Layer::TransitionOverlay(TransitionOverlayLayer {
            path: PathBuf::from("t.mov"),
            window_start: 4.6,
            window_stop: 5.0,
            source_cut_from: 0.0,
            source_cut_to: 0.4,
            role: TransitionRole::PreRoll,
        }));
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        emit_clip(&mut graph, &mut inputs, &clip, 0, &params());
        let script = graph.script();
        assert!(script.contains(
            "[2:v]trim=start=0:end=0.4,setpts=PTS-STARTPTS,scale=1920:1080,setpts=PTS+4.6/TB[c0_t0]"
        ));
        assert!(script.contains(
            "[c0_l0][c0_t0]overlay=0:0:eof_action=pass:enable='gte(t,4.6)*lt(t,5)'[c0_tv0]"
        ));
        assert!(script.ends_with("[c0_tv0]setsar=1,fps=30[c0_v]"));
    }

    #[test]
    fn test_audio_mix_groups_tracks_by_path() {
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        let tracks = vec![track("t.mov", 4.6), track("other.wav", 2.0), track("t.mov", 9.8)];
        emit_audio_mix(&mut graph, &mut inputs, "main_audio_raw", &tracks, "final_audio");
        let script = graph.script();

        assert_eq!(inputs.len(), 2);
        assert!(script.contains("adelay=4600|4600[at0p0]"));
        assert!(script.contains("adelay=9800|9800[at0p1]"));
        assert!(script.contains("[at0p0][at0p1]amix=inputs=2:duration=longest"));
        assert!(script.contains("adelay=2000|2000[at1]"));
        assert!(script.ends_with(
            "[main_audio_raw][at0][at1]amix=inputs=3:duration=first:dropout_transition=0:normalize=0[final_audio]"
        ));
    }

    #[test]
    fn test_no_tracks_copies_main_audio() {
        let mut graph = FilterGraph::default();
        let mut inputs = InputRegistry::new();
        emit_audio_mix(&mut graph, &mut inputs, "main_audio_raw", &[], "final_audio");
        assert_eq!(graph.script(), "[main_audio_raw]acopy[final_audio]");
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_single_pass_argv_shape() {
        let emitter = FilterGraphEmitter::with_defaults();
        let invocation = emitter
            .compile_single_pass(&two_clip_timeline(vec![track("t.mov", 4.6)]), Path::new("out.mp4"))
            .unwrap();
        let args = invocation.args();

        assert_eq!(args[0], "-y");
        assert_eq!(&args[1..7], ["-i", "a.mp4", "-i", "logo.png", "-i", "t.mov"]);
        assert_eq!(args[7], "-filter_complex");
        assert!(args[8].contains("[c0_v][c0_a][c1_v][c1_a]concat=n=2:v=1:a=1[main_video][main_audio_raw]"));
        assert_eq!(&args[9..13], ["-map", "[main_video]", "-map", "[final_audio]"]);
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert!((invocation.expected_duration_secs - 5.2).abs() < 1e-9);
    }

    #[test]
    fn test_batch_plan_layout() {
        let emitter = FilterGraphEmitter::with_defaults();
        let work = Path::new("/tmp/ffmpeg_render_deadbeef");
        let plan = emitter
            .compile_batch(&two_clip_timeline(vec![track("t.mov", 4.6)]), Path::new("out.mp4"), work)
            .unwrap();

        assert_eq!(plan.clip_renders.len(), 2);
        assert_eq!(plan.clip_renders[1].output, work.join("clip_0001.mp4"));
        assert_eq!(plan.clip_renders[1].maps, ["[c1_v]", "[c1_a]"]);
        assert_eq!(
            plan.concat_list_contents,
            "file '/tmp/ffmpeg_render_deadbeef/clip_0000.mp4'\nfile '/tmp/ffmpeg_render_deadbeef/clip_0001.mp4'\n"
        );
        assert_eq!(
            plan.concat.args(),
            [
                "-y", "-f", "concat", "-safe", "0", "-i",
                "/tmp/ffmpeg_render_deadbeef/concat_list.txt", "-c", "copy",
                "/tmp/ffmpeg_render_deadbeef/concat_video.mp4"
            ]
        );
        match &plan.finish {
            BatchFinish::Mix(mix) => {
                assert_eq!(mix.maps, ["0:v", "[final_audio]"]);
                assert_eq!(mix.codec_args[..2], ["-c:v", "copy"]);
                assert!(mix.filter_script.as_deref().unwrap().starts_with("[1:a]atrim"));
            }
            other => panic!("expected mix pass, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_without_tracks_copies_concat() {
        let emitter = FilterGraphEmitter::with_defaults();
        let plan = emitter
            .compile(&two_clip_timeline(Vec::new()), Path::new("out.mp4"), Path::new("/w"))
            .unwrap();
        assert_eq!(plan.strategy(), RenderStrategy::SinglePass);

        let batch = FilterGraphEmitter::new(FilterGraphConfig {
            batch_threshold: 1,
            ..FilterGraphConfig::default()
        })
        .compile(&two_clip_timeline(Vec::new()), Path::new("out.mp4"), Path::new("/w"))
        .unwrap();
        assert_eq!(batch.invocation_count(), 3);
        match batch {
            RenderPlan::Batch(plan) => assert_eq!(
                plan.finish,
                BatchFinish::Copy {
                    from: PathBuf::from("/w/concat_video.mp4"),
                    to: PathBuf::from("out.mp4"),
                }
            ),
            other => panic!("expected batch plan, got {other:?}"),
        }
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let emitter = FilterGraphEmitter::with_defaults();
        let plan = emitter
            .compile_batch(&two_clip_timeline(Vec::new()), Path::new("out.mp4"), Path::new("/it's"))
            .unwrap();
        assert!(plan
            .concat_list_contents
            .starts_with("file '/it'\\''s/clip_0000.mp4'\n"));
    }

    #[test]
    fn test_command_line_quotes_graph() {
        let invocation = FfmpegInvocation {
            inputs: vec![MediaInput {
                options: Vec::new(),
                path: PathBuf::from("my clip.mp4"),
            }],
            filter_script: Some("[0:v]null[v]".to_string()),
            maps: vec!["[v]".to_string()],
            codec_args: Vec::new(),
            output: PathBuf::from("out.mp4"),
            expected_duration_secs: 1.0,
        };
        assert_eq!(
            invocation.command_line("ffmpeg"),
            "ffmpeg -y -i 'my clip.mp4' -filter_complex '[0:v]null[v]' -map '[v]' out.mp4"
        );
    }
}
