//! Per-user delivery and merge settings.

use serde::{Deserialize, Serialize};

/// Output name used when the user has not chosen one.
pub const DEFAULT_OUTPUT_NAME: &str = "merged_video.mp4";

/// Where the finished artifact is delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Back to the user through the chat service.
    #[default]
    DirectMessaging,
    /// To the user's configured remote storage.
    RemoteStorage,
}

/// How a chat delivery presents the artifact.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadFormat {
    /// Playable video, with preview frame when available.
    #[default]
    Video,
    /// Generic file attachment.
    Document,
}

/// Merge strictness. Advisory: the engine always attempts stream copy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Never re-encode.
    Fast,
    /// Decide from compatibility.
    #[default]
    Smart,
    /// Always re-encode.
    Safe,
}

/// Target resolution policy. Advisory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Keep the first item's resolution.
    #[default]
    Auto,
    /// 1280x720.
    Hd720,
    /// 1920x1080.
    Hd1080,
    /// 3840x2160.
    Uhd4k,
}

/// Audio handling policy. Advisory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioPolicy {
    /// Keep every audio stream.
    #[default]
    KeepAll,
    /// Drop audio entirely.
    Mute,
}

/// Delivery settings carried by each merge queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DeliverySettings {
    /// Chosen destination.
    pub destination: Destination,
    /// Presentation for chat delivery.
    pub format: UploadFormat,
    /// File name of the merged artifact.
    pub output_name: String,
    /// Merge strictness.
    pub merge_mode: MergeMode,
    /// Resolution policy.
    pub resolution: ResolutionPolicy,
    /// Target frame rate; `None` keeps the source rate.
    pub fps: Option<u32>,
    /// Audio policy.
    pub audio: AudioPolicy,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            format: UploadFormat::default(),
            output_name: DEFAULT_OUTPUT_NAME.to_owned(),
            merge_mode: MergeMode::default(),
            resolution: ResolutionPolicy::default(),
            fps: None,
            audio: AudioPolicy::default(),
        }
    }
}

/// Characters removed from user-chosen names.
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Sanitise a user-chosen output name.
///
/// Path components and shell-hostile characters are stripped, a blank name
/// falls back to [`DEFAULT_OUTPUT_NAME`], and `.mp4` is appended unless the
/// name already ends with it. The merge always produces an MP4 container,
/// so any other extension stays part of the stem.
#[must_use]
pub fn normalize_output_name(raw: &str) -> String {
    let base: String = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !FORBIDDEN_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let base = base.trim().trim_start_matches('.');

    if base.is_empty() {
        return DEFAULT_OUTPUT_NAME.to_owned();
    }

    if base.to_ascii_lowercase().ends_with(".mp4") {
        base.to_owned()
    } else {
        format!("{base}.mp4")
    }
}
