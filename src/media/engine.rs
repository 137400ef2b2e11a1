//! Media engine contract and its ffmpeg implementation.
//!
//! The engine is a black box: it reads a concatenation manifest, writes one
//! output file, and exits 0 on success. Progress arrives on its status
//! stream and is forwarded as [`ProgressSample`]s.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::media::command::{run_captured, run_observed};
use crate::models::progress::ProgressSample;
use crate::progress::parser::parse_engine_line;
use crate::{AppError, Result};

/// Operations the merge pipeline needs from a media engine.
pub trait MediaEngine: Send + Sync {
    /// Stream-copy concatenate the inputs listed in `manifest` into
    /// `output`, sending progress on `progress` as it is observed.
    ///
    /// `total_secs` is the expected output duration used for percentages.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Tool` on spawn failure, timeout, or non-zero exit.
    fn concat(
        &self,
        manifest: &Path,
        output: &Path,
        total_secs: f64,
        progress: mpsc::Sender<ProgressSample>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Extract a single preview frame from `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Tool` if no frame was produced.
    fn preview_frame(
        &self,
        input: &Path,
        output: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// [`MediaEngine`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: String,
    merge_timeout: Duration,
    preview_timeout: Duration,
}

impl FfmpegEngine {
    /// Create an engine invoking `program`.
    #[must_use]
    pub fn new(program: impl Into<String>, merge_timeout: Duration, preview_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            merge_timeout,
            preview_timeout,
        }
    }
}

impl MediaEngine for FfmpegEngine {
    fn concat(
        &self,
        manifest: &Path,
        output: &Path,
        total_secs: f64,
        progress: mpsc::Sender<ProgressSample>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let args = concat_args(manifest, output);
        Box::pin(async move {
            info!(program = %self.program, total_secs, "starting stream-copy concat");
            let exit = run_observed(&self.program, args, self.merge_timeout, |line| {
                if let Some(sample) = parse_engine_line(line, total_secs) {
                    // A full channel only means the reporter is behind.
                    let _ = progress.try_send(sample);
                }
            })
            .await?;

            if exit.success {
                Ok(())
            } else {
                error!(tail = ?exit.tail, "media engine exited with failure");
                Err(AppError::Tool("media engine exited with failure".into()))
            }
        })
    }

    fn preview_frame(
        &self,
        input: &Path,
        output: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let args = preview_args(input, output);
        let output: PathBuf = output.to_path_buf();
        Box::pin(async move {
            let result = run_captured(&self.program, args, self.preview_timeout).await?;
            if result.success && tokio::fs::try_exists(&output).await.unwrap_or(false) {
                Ok(())
            } else {
                warn!(stderr = %result.stderr.trim(), "preview extraction failed");
                Err(AppError::Tool("preview frame was not produced".into()))
            }
        })
    }
}

/// Arguments for a stream-copy concatenation of `manifest` into `output`.
///
/// Maps the first video stream and any audio streams (audio optional so
/// silent inputs do not abort the run), regenerates timestamps, and moves
/// the index to the front of the container.
#[must_use]
pub fn concat_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        "-stats",
        "-f",
        "concat",
        "-safe",
        "0",
        "-fflags",
        "+genpts",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(manifest.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "0:a?",
            "-c",
            "copy",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments extracting one 320x180 frame at the one-second mark.
#[must_use]
pub fn preview_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error", "-ss", "1", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        ["-vf", "scale=320:180", "-vframes", "1"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}
