//! Running encoder invocations as child processes.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::time::Instant;

use reelweave_common::error::{RenderError, RenderResult};

use crate::filtergraph::FfmpegInvocation;

/// Progress of a single encoder run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessProgress {
    /// Fraction of the expected output written, in [0.0, 1.0].
    pub progress: f64,

    /// Output time reached so far (seconds).
    pub out_time_secs: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// The encoder reported `progress=end`.
    pub complete: bool,
}

/// Executes encoder invocations. Implemented by the real encoder and by
/// test doubles that record what they were asked to run.
pub trait ProcessRunner: Send + Sync {
    /// Run one invocation to completion, reporting progress as it goes.
    fn run(
        &self,
        invocation: &FfmpegInvocation,
        progress: &dyn Fn(ProcessProgress),
    ) -> RenderResult<()>;

    /// Check if the encoder is available on the system.
    fn is_available(&self) -> bool;

    /// Encoder name.
    fn name(&self) -> &str;
}

/// Runs invocations with the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    bin: String,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }
}

impl ProcessRunner for FfmpegRunner {
    fn run(
        &self,
        invocation: &FfmpegInvocation,
        progress: &dyn Fn(ProcessProgress),
    ) -> RenderResult<()> {
        let args = invocation.args();
        tracing::debug!(command = %invocation.command_line(&self.bin), "Running ffmpeg");

        let mut cmd = Command::new(&self.bin);
        cmd.args(["-progress", "pipe:1", "-nostats"])
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| RenderError::external_process(&self.bin, None, format!("failed to start: {e}")))?;

        tracing::info!(
            pid = child.id(),
            args_len = args.len(),
            output = %invocation.output.display(),
            expected_secs = invocation.expected_duration_secs,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::external_process(&self.bin, None, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::external_process(&self.bin, None, "stderr not captured"))?;

        // Drain stderr concurrently so a full pipe cannot stall the encoder.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        if let Err(err) = read_progress(BufReader::new(stdout), invocation, start, progress) {
            tracing::error!(error = %err, pid = child.id(), "Lost ffmpeg progress stream, stopping encoder");
            let _ = child.kill();
            let _ = child.wait();
            let _ = stderr_task.join();
            return Err(err.into());
        }

        let status = child.wait()?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            tracing::error!(
                code = ?status.code(),
                output = %invocation.output.display(),
                "ffmpeg exited with failure"
            );
            return Err(RenderError::external_process(
                &self.bin,
                status.code(),
                stderr_output.trim(),
            ));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            output = %invocation.output.display(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.bin)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Forward `-progress` reports from `reader` until the stream closes.
fn read_progress(
    mut reader: impl BufRead,
    invocation: &FfmpegInvocation,
    start: Instant,
    progress: &dyn Fn(ProcessProgress),
) -> std::io::Result<()> {
    let mut line = String::new();
    let mut state = ProgressState::default();
    let mut last_progress_secs = 0.0f64;
    let mut last_progress_wall = Instant::now();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key != "progress" {
            continue;
        }

        if state.out_time_secs > last_progress_secs + 0.001 {
            last_progress_secs = state.out_time_secs;
            last_progress_wall = Instant::now();
        }
        progress(progress_report(
            &state,
            invocation.expected_duration_secs,
            start.elapsed().as_secs_f64(),
        ));
        if last_progress_wall.elapsed().as_secs() >= 10 {
            tracing::warn!(
                out_time_secs = state.out_time_secs,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "No ffmpeg progress advancement for 10s"
            );
            last_progress_wall = Instant::now();
        }
    }
}

/// Whether `binary` resolves on `PATH` (or is an existing path).
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v '{binary}' >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Accumulated `-progress` key/value state.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    pub(crate) out_time_secs: f64,
    pub(crate) complete: bool,
}

impl ProgressState {
    pub(crate) fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, ffmpeg reports microseconds here too.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

pub(crate) fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> ProcessProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ProcessProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time_secs: state.out_time_secs,
        eta_secs: if state.complete { 0.0 } else { eta_secs },
        complete: state.complete,
    }
}
