//! Timecode, frame, and tick arithmetic.
//!
//! Every position on a compiled timeline is quantized to whole frames at
//! the timeline frame rate. Channel files express durations either as
//! `HH:MM:SS:FF` timecodes or as plain seconds; both end up here.
//!
//! Interchange documents additionally carry "ticks", a fixed sub-frame
//! unit of [`PPRO_TICKS_PER_SECOND`] per second that does not depend on
//! the frame rate.

use std::fmt;
use std::str::FromStr;

use crate::error::{RenderError, RenderResult};

/// Sub-frame ticks per second used by interchange documents.
pub const PPRO_TICKS_PER_SECOND: u64 = 254_016_000_000;

/// Absorbs binary floating point error so that e.g. `0.2 * 30` quantizes
/// to 6 frames rather than 5.
const FRAME_EPSILON: f64 = 1e-6;

/// A `HH:MM:SS:FF` timecode. The frame field is interpreted at whatever
/// reference rate the caller passes to the conversion methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

impl Timecode {
    pub fn new(hours: u32, minutes: u32, seconds: u32, frames: u32) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            frames,
        }
    }

    /// Parse `HH:MM:SS:FF`. Each field must be a non-negative integer.
    pub fn parse(value: &str) -> RenderResult<Self> {
        let invalid = || RenderError::InvalidTimecode {
            value: value.to_string(),
        };

        let fields = value
            .trim()
            .split(':')
            .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
            .collect::<RenderResult<Vec<u32>>>()?;

        match fields.as_slice() {
            [hours, minutes, seconds, frames] => {
                Ok(Self::new(*hours, *minutes, *seconds, *frames))
            }
            _ => Err(invalid()),
        }
    }

    /// Total frame count: `(h*3600 + m*60 + s) * fps + ff`.
    pub fn to_frames(&self, fps: u32) -> u64 {
        let whole_secs =
            self.hours as u64 * 3600 + self.minutes as u64 * 60 + self.seconds as u64;
        whole_secs * fps as u64 + self.frames as u64
    }

    pub fn to_seconds(&self, fps: u32) -> f64 {
        frames_to_seconds(self.to_frames(fps), fps)
    }

    /// Inverse of [`Timecode::to_frames`]. A zero `fps` yields the zero timecode.
    pub fn from_frames(frames: u64, fps: u32) -> Self {
        if fps == 0 {
            return Self::default();
        }
        let fps = fps as u64;
        let total_secs = frames / fps;
        Self {
            hours: (total_secs / 3600) as u32,
            minutes: ((total_secs % 3600) / 60) as u32,
            seconds: (total_secs % 60) as u32,
            frames: (frames % fps) as u32,
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

impl FromStr for Timecode {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `floor(seconds × fps)`. Negative or non-finite inputs quantize to 0.
pub fn seconds_to_frames(seconds: f64, fps: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 || fps == 0 {
        return 0;
    }
    (seconds * fps as f64 + FRAME_EPSILON).floor() as u64
}

pub fn frames_to_seconds(frames: u64, fps: u32) -> f64 {
    if fps == 0 {
        return 0.0;
    }
    frames as f64 / fps as f64
}

/// Round a duration down to the nearest whole frame.
pub fn quantize_seconds(seconds: f64, fps: u32) -> f64 {
    frames_to_seconds(seconds_to_frames(seconds, fps), fps)
}

/// `floor(frames / fps × ticks_per_second)`, computed in integers so the
/// result is exact for every frame count.
pub fn frames_to_ticks(frames: u64, fps: u32) -> u64 {
    if fps == 0 {
        return 0;
    }
    let ticks = frames as u128 * PPRO_TICKS_PER_SECOND as u128 / fps as u128;
    ticks.min(u64::MAX as u128) as u64
}

pub fn seconds_to_ticks(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * PPRO_TICKS_PER_SECOND as f64).floor() as u64
}
