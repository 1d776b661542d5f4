//! XMEML (Final Cut Pro 7 interchange, version 4) export.
//!
//! The document mirrors the timeline as an editable sequence:
//!
//! | Track | Content |
//! |-------|---------|
//! | V1    | blurred, width-filling background copy of each main clip |
//! | V2    | the main clip, height-fitted |
//! | V3    | logo overlays |
//! | V4    | transition overlay fragments |
//! | A1/A2 | left/right source audio of each main clip, linked to V2 |
//! | A3/A4 | audio of each transition fragment, linked to V4 |
//!
//! Each asset path gets one `file-N` id. The first `<file>` for a path in
//! document order carries the full descriptor; later ones carry only the
//! id attribute.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use reelweave_common::error::RenderResult;
use reelweave_common::timecode::{frames_to_ticks, seconds_to_frames};
use reelweave_timeline_model::layer::{ImageOverlayLayer, MainVideoLayer, TransitionOverlayLayer};
use reelweave_timeline_model::media::{MediaCatalog, MediaInfo};
use reelweave_timeline_model::timeline::{Clip, Timeline};
use uuid::Uuid;

use crate::xml::{write_document, Element};

const PROLOGUE: &[&str] = &["<?xml version=\"1.0\" encoding=\"UTF-8\"?>", "<!DOCTYPE xmeml>"];
const CODEC_NAME: &str = "Apple ProRes 422";

/// Track numbers used for linking.
const MAIN_VIDEO_TRACK: u32 = 2;
const TRANSITION_VIDEO_TRACK: u32 = 4;

/// Builds XMEML documents from timelines.
pub struct XmemlEmitter<'a> {
    catalog: &'a MediaCatalog,
    sequence_name: String,
    sequence_uuid: Uuid,
}

impl<'a> XmemlEmitter<'a> {
    /// Emitter reading source geometry from `catalog`. Paths missing from
    /// the catalog fall back to default geometry with a warning.
    pub fn new(catalog: &'a MediaCatalog) -> Self {
        Self {
            catalog,
            sequence_name: "reelweave".to_string(),
            sequence_uuid: Uuid::new_v4(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.sequence_name = name.into();
        self
    }

    /// Fix the sequence uuid, for reproducible output.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.sequence_uuid = uuid;
        self
    }

    /// Compile `timeline` into a complete XMEML document.
    pub fn compile(&self, timeline: &Timeline) -> RenderResult<String> {
        let root = self.build(timeline)?;
        Ok(write_document(PROLOGUE, &root))
    }

    /// Compile `timeline` into the `<xmeml>` element tree.
    pub fn build(&self, timeline: &Timeline) -> RenderResult<Element> {
        timeline.validate()?;
        let fps = timeline.fps();

        let mut state = SequenceState::new(self.catalog, timeline);
        let mut start_frame = 0u64;
        for (index, clip) in timeline.clips().iter().enumerate() {
            state.add_clip(index, clip, start_frame);
            start_frame += seconds_to_frames(clip.duration(), fps);
        }
        let sequence_frames = start_frame;

        let tracks = state.tracks;
        let mut video = Element::new("video").child(video_format(timeline));
        for items in tracks.video {
            video.push(track(items, true));
        }
        let mut audio = Element::new("audio")
            .child(Element::leaf("numOutputChannels", 2))
            .child(
                Element::new("format").child(
                    Element::new("samplecharacteristics")
                        .child(Element::leaf("depth", 16))
                        .child(Element::leaf("samplerate", 48000)),
                ),
            )
            .child(
                Element::new("outputs")
                    .child(output_group(1))
                    .child(output_group(2)),
            );
        for items in tracks.audio {
            audio.push(track(items, false));
        }

        let hex = self.sequence_uuid.simple().to_string();
        let sequence = Element::new("sequence")
            .attr("id", format!("sequence-{}", &hex[..8]))
            .child(Element::leaf("uuid", self.sequence_uuid))
            .child(Element::leaf("duration", sequence_frames))
            .child(rate(fps))
            .child(Element::leaf("name", &self.sequence_name))
            .child(Element::new("media").child(video).child(audio))
            .child(timecode(fps))
            .child(Element::new("labels").child(Element::leaf("label2", "Forest")))
            .child(logging_info());

        let mut root = Element::new("xmeml").attr("version", "4").child(sequence);
        strip_repeated_file_descriptors(&mut root);

        tracing::info!(
            clips = timeline.clips().len(),
            files = state.file_ids.len(),
            duration_frames = sequence_frames,
            "Built XMEML sequence"
        );
        Ok(root)
    }
}

/// Clipitems per track, in clip order.
#[derive(Default)]
struct Tracks {
    video: [Vec<Element>; 4],
    audio: [Vec<Element>; 4],
}

struct SequenceState<'a> {
    catalog: &'a MediaCatalog,
    fps: u32,
    width: u32,
    height: u32,
    sequence_frames: u64,
    file_ids: HashMap<String, String>,
    tracks: Tracks,
}

impl<'a> SequenceState<'a> {
    fn new(catalog: &'a MediaCatalog, timeline: &Timeline) -> Self {
        Self {
            catalog,
            fps: timeline.fps(),
            width: timeline.width(),
            height: timeline.height(),
            sequence_frames: seconds_to_frames(timeline.total_duration(), timeline.fps()),
            file_ids: HashMap::new(),
            tracks: Tracks::default(),
        }
    }

    fn frames(&self, secs: f64) -> u64 {
        seconds_to_frames(secs, self.fps)
    }

    fn file_id(&mut self, path: &Path) -> String {
        let key = path.display().to_string();
        let next = self.file_ids.len() + 1;
        self.file_ids
            .entry(key)
            .or_insert_with(|| format!("file-{next}"))
            .clone()
    }

    fn media_info(&self, path: &Path) -> MediaInfo {
        self.catalog.get_or_default(path)
    }

    fn add_clip(&mut self, index: usize, clip: &Clip, start_frame: u64) {
        let duration_frames = self.frames(clip.duration());

        if let Some(video) = clip.main_video() {
            self.add_main_video(index, video, start_frame, duration_frames);
        }
        for (k, logo) in clip.image_overlays().enumerate() {
            self.add_logo(index, k, logo, start_frame, duration_frames);
        }
        for (k, overlay) in clip.transition_overlays().enumerate() {
            self.add_transition(index, k, overlay, start_frame);
        }
    }

    fn add_main_video(
        &mut self,
        index: usize,
        video: &MainVideoLayer,
        start_frame: u64,
        duration_frames: u64,
    ) {
        let info = self.media_info(&video.path);
        let file_id = self.file_id(&video.path);
        let in_frame = self.frames(video.cut_from);
        let master = format!("masterclip-{index}");
        let placement = Placement {
            start: start_frame,
            duration: duration_frames,
            in_frame,
        };

        let background_id = format!("clipitem-{}", index * 10 + 1);
        let main_id = format!("clipitem-{}", index * 10 + 2);
        let left_id = format!("audio-clipitem-{}", index * 10 + 1);
        let right_id = format!("audio-clipitem-{}", index * 10 + 2);

        let file = self.file_element(&file_id, &video.path, &info, duration_frames, true);

        let background_scale =
            f64::from(self.width) / (f64::from(info.width) * info.pixel_aspect_ratio()) * 100.0;
        let mut background = self
            .clipitem(&background_id, &master, &video.path, &placement, "none")
            .child(file.clone())
            .child(basic_motion(background_scale));
        if let Some(blur) = video.blur {
            background.push(gaussian_blur(blur));
        }
        self.tracks.video[0].push(with_log_and_color(background));

        let clip_index = self.tracks.video[1].len() + 1;
        let links = link_set(
            (main_id.as_str(), MAIN_VIDEO_TRACK),
            [(left_id.as_str(), 1), (right_id.as_str(), 2)],
            clip_index,
        );

        let main_scale = f64::from(self.height) / f64::from(info.height) * 100.0;
        let mut main = self
            .clipitem(&main_id, &master, &video.path, &placement, "none")
            .child(file.clone())
            .child(basic_motion(main_scale));
        main.children.extend(links.iter().cloned());
        self.tracks.video[1].push(with_log_and_color(main));

        for (channel, id) in [(1u32, &left_id), (2u32, &right_id)] {
            let item = self.audio_clipitem(id, &master, &video.path, &placement, &file, channel, &links);
            self.tracks.audio[channel as usize - 1].push(item);
        }
    }

    fn add_logo(
        &mut self,
        index: usize,
        k: usize,
        logo: &ImageOverlayLayer,
        start_frame: u64,
        duration_frames: u64,
    ) {
        let info = MediaInfo {
            width: self.width,
            height: self.height,
            ..self.media_info(&logo.path)
        };
        let file_id = self.file_id(&logo.path);
        let id = if k == 0 {
            format!("logo-{index}")
        } else {
            format!("logo-{index}-{k}")
        };
        let placement = Placement {
            start: start_frame,
            duration: duration_frames,
            in_frame: 0,
        };
        let file = self.file_element(&file_id, &logo.path, &info, self.sequence_frames, false);
        let item = self
            .clipitem(&id, &format!("masterclip-{id}"), &logo.path, &placement, "straight")
            .child(file);
        self.tracks.video[2].push(with_log_and_color(item));
    }

    fn add_transition(
        &mut self,
        index: usize,
        k: usize,
        overlay: &TransitionOverlayLayer,
        clip_start_frame: u64,
    ) {
        let start = clip_start_frame + self.frames(overlay.window_start);
        let end = clip_start_frame + self.frames(overlay.window_stop);
        if end <= start {
            tracing::debug!(clip = index, overlay = k, "Transition fragment shorter than a frame, skipped");
            return;
        }
        let placement = Placement {
            start,
            duration: end - start,
            in_frame: self.frames(overlay.source_cut_from),
        };

        let fallback = MediaInfo {
            width: self.width,
            height: self.height,
            ..MediaInfo::FALLBACK
        };
        let info = self
            .catalog
            .get(&overlay.path)
            .copied()
            .unwrap_or(fallback);
        let file_id = self.file_id(&overlay.path);
        let file = self.file_element(&file_id, &overlay.path, &info, placement.duration, true);

        let id = format!("trans-{index}-{k}");
        let master = format!("masterclip-trans-{index}-{k}");
        let left_id = format!("{id}-a3");
        let right_id = format!("{id}-a4");

        let clip_index = self.tracks.video[3].len() + 1;
        let links = link_set(
            (id.as_str(), TRANSITION_VIDEO_TRACK),
            [(left_id.as_str(), 3), (right_id.as_str(), 4)],
            clip_index,
        );

        let mut item = self
            .clipitem(&id, &master, &overlay.path, &placement, "none")
            .child(file.clone());
        item.children.extend(links.iter().cloned());
        self.tracks.video[3].push(with_log_and_color(item));

        for (channel, slot, item_id) in [(1u32, 2usize, &left_id), (2u32, 3usize, &right_id)] {
            let audio = self.audio_clipitem(item_id, &master, &overlay.path, &placement, &file, channel, &links);
            self.tracks.audio[slot].push(audio);
        }
    }

    /// Fields shared by every video clipitem, up to and excluding `<file>`.
    fn clipitem(
        &self,
        id: &str,
        master: &str,
        path: &Path,
        placement: &Placement,
        alpha: &str,
    ) -> Element {
        Element::new("clipitem")
            .attr("id", id)
            .child(Element::leaf("masterclipid", master))
            .child(Element::leaf("name", file_name(path)))
            .child(Element::leaf("enabled", "TRUE"))
            .child(Element::leaf("duration", placement.duration))
            .child(rate(self.fps))
            .child(Element::leaf("start", placement.start))
            .child(Element::leaf("end", placement.start + placement.duration))
            .child(Element::leaf("in", placement.in_frame))
            .child(Element::leaf("out", placement.in_frame + placement.duration))
            .child(Element::leaf("pproTicksIn", 0))
            .child(Element::leaf(
                "pproTicksOut",
                frames_to_ticks(placement.duration, self.fps),
            ))
            .child(Element::leaf("alphatype", alpha))
            .child(Element::leaf("pixelaspectratio", "square"))
            .child(Element::leaf("anamorphic", "FALSE"))
    }

    #[allow(clippy::too_many_arguments)]
    fn audio_clipitem(
        &self,
        id: &str,
        master: &str,
        path: &Path,
        placement: &Placement,
        file: &Element,
        channel: u32,
        links: &[Element],
    ) -> Element {
        let mut item = Element::new("clipitem")
            .attr("id", id)
            .child(Element::leaf("masterclipid", master))
            .child(Element::leaf("name", file_name(path)))
            .child(Element::leaf("enabled", "TRUE"))
            .child(Element::leaf("duration", placement.duration))
            .child(rate(self.fps))
            .child(Element::leaf("start", placement.start))
            .child(Element::leaf("end", placement.start + placement.duration))
            .child(Element::leaf("in", placement.in_frame))
            .child(Element::leaf("out", placement.in_frame + placement.duration))
            .child(file.clone())
            .child(
                Element::new("sourcetrack")
                    .child(Element::leaf("mediatype", "audio"))
                    .child(Element::leaf("trackindex", channel)),
            );
        item.children.extend(links.iter().cloned());
        item
    }

    /// Full file descriptor. Repeats are reduced to the id afterwards.
    fn file_element(
        &self,
        id: &str,
        path: &Path,
        info: &MediaInfo,
        clip_frames: u64,
        with_audio: bool,
    ) -> Element {
        let duration = if info.is_usable() {
            self.frames(info.duration_secs)
        } else {
            clip_frames
        };
        let pixel_aspect = match info.pixel_aspect {
            Some(par) if (par - 1.0).abs() > 1e-9 && par > 0.0 => format!("{par:.4}"),
            _ => "square".to_string(),
        };

        let mut media = Element::new("media").child(
            Element::new("video").child(
                Element::new("samplecharacteristics")
                    .child(rate(self.fps))
                    .child(Element::leaf("width", info.width))
                    .child(Element::leaf("height", info.height))
                    .child(Element::leaf("anamorphic", "FALSE"))
                    .child(Element::leaf("pixelaspectratio", pixel_aspect))
                    .child(Element::leaf("fielddominance", "none")),
            ),
        );
        if with_audio {
            media.push(
                Element::new("audio")
                    .child(
                        Element::new("samplecharacteristics")
                            .child(Element::leaf("depth", 16))
                            .child(Element::leaf("samplerate", 48000)),
                    )
                    .child(Element::leaf("channelcount", 2)),
            );
        }

        Element::new("file")
            .attr("id", id)
            .child(Element::leaf("name", file_name(path)))
            .child(Element::leaf("pathurl", encode_pathurl(path)))
            .child(rate(self.fps))
            .child(Element::leaf("duration", duration))
            .child(timecode(self.fps))
            .child(media)
    }
}

/// Where a clipitem sits on the sequence and in its source (frames).
struct Placement {
    start: u64,
    duration: u64,
    in_frame: u64,
}

/// Links tying a video clipitem to its two audio clipitems. The same set
/// is attached to all three items.
fn link_set(video: (&str, u32), audio: [(&str, u32); 2], clip_index: usize) -> Vec<Element> {
    let mut links = vec![Element::new("link")
        .child(Element::leaf("linkclipref", video.0))
        .child(Element::leaf("mediatype", "video"))
        .child(Element::leaf("trackindex", video.1))
        .child(Element::leaf("clipindex", clip_index))];
    for (id, track) in audio {
        links.push(
            Element::new("link")
                .child(Element::leaf("linkclipref", id))
                .child(Element::leaf("mediatype", "audio"))
                .child(Element::leaf("trackindex", track))
                .child(Element::leaf("clipindex", clip_index))
                .child(Element::leaf("groupindex", 1)),
        );
    }
    links
}

fn track(items: Vec<Element>, video: bool) -> Element {
    let mut track = Element::new("track");
    track.children = items;
    if video {
        track.push(Element::leaf("enabled", "TRUE"));
        track.push(Element::leaf("locked", "FALSE"));
    }
    track
}

fn rate(fps: u32) -> Element {
    Element::new("rate")
        .child(Element::leaf("timebase", fps))
        .child(Element::leaf("ntsc", "FALSE"))
}

fn timecode(fps: u32) -> Element {
    Element::new("timecode")
        .child(rate(fps))
        .child(Element::leaf("string", "00:00:00:00"))
        .child(Element::leaf("frame", 0))
        .child(Element::leaf("displayformat", "NDF"))
}

fn video_format(timeline: &Timeline) -> Element {
    let qtcodec = Element::new("qtcodec")
        .child(Element::leaf("codecname", CODEC_NAME))
        .child(Element::leaf("codectypename", CODEC_NAME))
        .child(Element::leaf("codectypecode", "apcn"))
        .child(Element::leaf("codecvendorcode", "appl"))
        .child(Element::leaf("spatialquality", 1024))
        .child(Element::leaf("temporalquality", 0))
        .child(Element::leaf("keyframerate", 0))
        .child(Element::leaf("datarate", 0));
    let codec = Element::new("codec")
        .child(Element::leaf("name", CODEC_NAME))
        .child(
            Element::new("appspecificdata")
                .child(Element::leaf("appname", "Final Cut Pro"))
                .child(Element::leaf("appmanufacturer", "Apple Inc."))
                .child(Element::leaf("appversion", "7.0"))
                .child(Element::new("data").child(qtcodec)),
        );
    Element::new("format").child(
        Element::new("samplecharacteristics")
            .child(rate(timeline.fps()))
            .child(codec)
            .child(Element::leaf("width", timeline.width()))
            .child(Element::leaf("height", timeline.height()))
            .child(Element::leaf("anamorphic", "FALSE"))
            .child(Element::leaf("pixelaspectratio", "square"))
            .child(Element::leaf("fielddominance", "none"))
            .child(Element::leaf("colordepth", 24)),
    )
}

fn output_group(index: u32) -> Element {
    Element::new("group")
        .child(Element::leaf("index", index))
        .child(Element::leaf("numchannels", 1))
        .child(Element::leaf("downmix", 0))
        .child(Element::new("channel").child(Element::leaf("index", index)))
}

fn logging_info() -> Element {
    let mut info = Element::new("logginginfo");
    for tag in [
        "description",
        "scene",
        "shottake",
        "lognote",
        "good",
        "originalvideofilename",
        "originalaudiofilename",
    ] {
        info.push(Element::new(tag));
    }
    info
}

fn with_log_and_color(item: Element) -> Element {
    let mut color = Element::new("colorinfo");
    for tag in ["lut", "lut1", "asc_sop", "asc_sat", "lut2"] {
        color.push(Element::new(tag));
    }
    item.child(logging_info())
        .child(color)
        .child(Element::new("labels").child(Element::leaf("label2", "Iris")))
}

fn basic_motion(scale: f64) -> Element {
    let effect = Element::new("effect")
        .child(Element::leaf("name", "Basic Motion"))
        .child(Element::leaf("effectid", "basic"))
        .child(Element::leaf("effectcategory", "motion"))
        .child(Element::leaf("effecttype", "motion"))
        .child(Element::leaf("mediatype", "video"))
        .child(Element::leaf("pproBypass", "false"))
        .child(parameter("scale", "Scale", Some(("0", "1000")), ParamValue::Scalar(format!("{scale:.1}"))))
        .child(parameter("rotation", "Rotation", Some(("-8640", "8640")), ParamValue::Scalar("0".into())))
        .child(parameter("center", "Center", None, ParamValue::Point))
        .child(parameter("centerOffset", "Anchor Point", None, ParamValue::Point))
        .child(parameter(
            "antiflicker",
            "Anti-flicker Filter",
            Some(("0.0", "1.0")),
            ParamValue::Scalar("0".into()),
        ));
    Element::new("filter").child(effect)
}

/// Blur strengths in `[0, 1]` are fractions of the 0-100 radius range;
/// larger values are taken as a radius already.
fn gaussian_blur(blur: f64) -> Element {
    let radius = if (0.0..=1.0).contains(&blur) {
        blur * 100.0
    } else {
        blur
    };
    let effect = Element::new("effect")
        .child(Element::leaf("name", "Gaussian Blur"))
        .child(Element::leaf("effectid", "Gaussian Blur"))
        .child(Element::leaf("effectcategory", "Blur"))
        .child(Element::leaf("effecttype", "motion"))
        .child(Element::leaf("mediatype", "video"))
        .child(Element::leaf("pproBypass", "false"))
        .child(parameter(
            "radius",
            "Radius",
            Some(("0", "100")),
            ParamValue::Scalar(format!("{radius:.1}")),
        ));
    Element::new("filter").child(effect)
}

enum ParamValue {
    Scalar(String),
    /// A 2D value at the origin.
    Point,
}

fn parameter(id: &str, name: &str, range: Option<(&str, &str)>, value: ParamValue) -> Element {
    let mut param = Element::new("parameter")
        .attr("authoringApp", "PremierePro")
        .child(Element::leaf("parameterid", id))
        .child(Element::leaf("name", name));
    if let Some((min, max)) = range {
        param.push(Element::leaf("valuemin", min));
        param.push(Element::leaf("valuemax", max));
    }
    param.push(match value {
        ParamValue::Scalar(value) => Element::leaf("value", value),
        ParamValue::Point => Element::new("value")
            .child(Element::leaf("horiz", 0))
            .child(Element::leaf("vert", 0)),
    });
    param
}

/// Keep the first `<file>` per id intact and reduce the rest to the id.
fn strip_repeated_file_descriptors(root: &mut Element) {
    let mut seen = HashSet::new();
    root.walk_mut(&mut |element: &mut Element| {
        if element.name != "file" {
            return;
        }
        let Some(id) = element.attr_value("id").map(str::to_string) else {
            return;
        };
        if !seen.insert(id) {
            element.children.clear();
        }
    });
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `file://localhost/...` URL for an asset path. Backslashes count as
/// separators, `.` and `..` are resolved lexically, a drive letter becomes
/// `X%3a`, and every segment is percent-encoded on its own.
pub fn encode_pathurl(path: &Path) -> String {
    let raw = path.display().to_string().replace('\\', "/");
    let (drive, rest) = match raw.as_bytes() {
        [letter, b':', ..] if letter.is_ascii_alphabetic() => {
            (Some(letter.to_ascii_uppercase() as char), &raw[2..])
        }
        _ => (None, raw.as_str()),
    };

    let mut segments: Vec<&str> = Vec::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str().unwrap_or_default()),
            Component::ParentDir => {
                if segments.pop().is_none() && !rest.starts_with('/') {
                    segments.push("..");
                }
            }
            _ => {}
        }
    }

    let encoded: Vec<String> = segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| percent_encode(s))
        .collect();
    match drive {
        Some(letter) => format!("file://localhost/{letter}%3a/{}", encoded.join("/")),
        None => format!("file://localhost/{}", encoded.join("/")),
    }
}

fn percent_encode(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            result.push(byte as char);
        } else {
            result.push_str(&format!("%{byte:02X}"));
        }
    }
    result
}
