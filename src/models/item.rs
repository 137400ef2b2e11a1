//! Queue item model: one accepted media file plus its probed metadata.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

/// Metadata reported by the media probe for one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct MediaInfo {
    /// Playback duration in seconds.
    pub duration_secs: f64,
    /// Width of the first video stream in pixels.
    pub width: u32,
    /// Height of the first video stream in pixels.
    pub height: u32,
    /// Frame rate of the first video stream.
    pub fps: f64,
    /// Codec tag of the first video stream (e.g. `h264`).
    pub codec: String,
    /// Whether at least one audio stream is present.
    pub has_audio: bool,
}

impl MediaInfo {
    /// Resolution formatted as `WxH`.
    #[must_use]
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Frame rate formatted for display and set comparison.
    #[must_use]
    pub fn fps_label(&self) -> String {
        let rounded = (self.fps * 1000.0).round() / 1000.0;
        format!("{rounded}")
    }
}

/// An accepted media file waiting in a merge queue.
///
/// Items are immutable once created; the backing file is owned by the
/// queue and deleted when the item leaves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct QueueItem {
    /// Stable identity derived from content digest and submission reference.
    pub id: String,
    /// Name shown to the user; unique per queue, case-insensitively.
    pub display_name: String,
    /// Local path of the backing file.
    pub path: PathBuf,
    /// Size of the backing file in bytes.
    pub size_bytes: u64,
    /// Probed stream metadata.
    pub media: MediaInfo,
    /// When the item was accepted.
    pub submitted_at: DateTime<Utc>,
}

impl QueueItem {
    /// Construct a new item stamped with the current time.
    #[must_use]
    pub fn new(
        id: String,
        display_name: String,
        path: PathBuf,
        size_bytes: u64,
        media: MediaInfo,
    ) -> Self {
        Self {
            id,
            display_name,
            path,
            size_bytes,
            media,
            submitted_at: Utc::now(),
        }
    }

    /// Duration in seconds, shorthand for `media.duration_secs`.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.media.duration_secs
    }
}

/// Compute an item identity from the file content and the submission
/// reference (e.g. the chat event that delivered it).
///
/// The display name does not participate: two uploads of the same bytes
/// under different names from the same submission collide, while the same
/// bytes submitted twice by separate events do not.
///
/// This reads the whole file; call it from a blocking context.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read.
pub fn derive_identity(path: &Path, submission_ref: &str) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0_u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    hasher.update(b"\0");
    hasher.update(submission_ref.as_bytes());

    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(32);
    Ok(hex)
}
