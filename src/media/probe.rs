//! Media inspection through the external probe tool.
//!
//! Each attribute is fetched by its own sub-query so one failing stream
//! lookup cannot take the whole probe down. Every attribute except the
//! duration has a fallback; a missing duration is reported as `0.0` and the
//! queue rejects the item.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::media::command::run_captured;
use crate::models::item::MediaInfo;

/// Width assumed when the probe cannot read it.
pub const DEFAULT_WIDTH: u32 = 1920;
/// Height assumed when the probe cannot read it.
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Frame rate assumed when the probe cannot read it.
pub const DEFAULT_FPS: f64 = 30.0;
/// Codec assumed when the probe cannot read it.
pub const DEFAULT_CODEC: &str = "h264";

#[derive(Debug, Deserialize)]
struct ProbeDoc {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Stateless wrapper around the probe binary.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    program: String,
    timeout: Duration,
}

impl MediaProbe {
    /// Create a probe that invokes `program` with `timeout` per sub-query.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Inspect `path`, falling back to defaults for anything unreadable.
    pub async fn probe(&self, path: &Path) -> MediaInfo {
        let duration_secs = self
            .query(path, &["-show_entries", "format=duration"])
            .await
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(0.0);

        let video = self
            .query(
                path,
                &[
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=width,height,r_frame_rate,codec_name",
                ],
            )
            .await;
        let stream = video.as_deref().and_then(first_stream);

        let (width, height) = stream
            .as_ref()
            .and_then(|s| Some((s.width?, s.height?)))
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));
        let fps = stream
            .as_ref()
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
            .unwrap_or(DEFAULT_FPS);
        let codec = stream
            .and_then(|s| s.codec_name)
            .unwrap_or_else(|| DEFAULT_CODEC.to_owned());

        // Assume audio when the audio lookup itself fails.
        let has_audio = self
            .query(
                path,
                &["-select_streams", "a:0", "-show_entries", "stream=codec_type"],
            )
            .await
            .as_deref()
            .and_then(parse_stream_presence)
            .unwrap_or(true);

        MediaInfo {
            duration_secs,
            width,
            height,
            fps,
            codec,
            has_audio,
        }
    }

    /// Run one JSON sub-query; `None` on any failure.
    async fn query(&self, path: &Path, entries: &[&str]) -> Option<String> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("-v"), OsStr::new("error")];
        args.extend(entries.iter().map(OsStr::new));
        args.extend([OsStr::new("-of"), OsStr::new("json"), path.as_os_str()]);

        match run_captured(&self.program, args, self.timeout).await {
            Ok(out) if out.success => Some(out.stdout),
            Ok(out) => {
                warn!(path = %path.display(), stderr = %out.stderr.trim(), "probe query failed");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "probe query could not run");
                None
            }
        }
    }
}

/// Extract a positive duration from a probe JSON document.
#[must_use]
pub fn parse_duration(json: &str) -> Option<f64> {
    let doc: ProbeDoc = serde_json::from_str(json).ok()?;
    let secs: f64 = doc.format?.duration?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Parse a frame rate given as `num/den` or a plain number.
#[must_use]
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den.abs() < f64::EPSILON {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Whether a stream-selection query returned at least one stream.
#[must_use]
pub fn parse_stream_presence(json: &str) -> Option<bool> {
    let doc: ProbeDoc = serde_json::from_str(json).ok()?;
    Some(!doc.streams.is_empty())
}

fn first_stream(json: &str) -> Option<ProbeStream> {
    let doc: ProbeDoc = serde_json::from_str(json).ok()?;
    doc.streams.into_iter().next()
}
