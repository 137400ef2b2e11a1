//! Chat-transport abstraction.
//!
//! The merge pipeline never talks to Slack directly. It posts, edits, and
//! deletes status text through [`Messenger`] and hands finished artifacts
//! to an [`ArtifactUploader`]. The Slack implementation lives in
//! [`crate::slack::client`]; tests substitute in-memory recorders.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::models::settings::UploadFormat;
use crate::Result;

/// Reference to a posted message that can later be edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    /// Conversation the message lives in.
    pub channel: String,
    /// Message timestamp (Slack's message identifier).
    pub ts: String,
}

/// Text messaging towards a single user.
pub trait Messenger: Send + Sync {
    /// Post `text` to the user's direct conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) if the post fails.
    fn notify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageHandle>> + Send + '_>>;

    /// Replace the text of a previously posted message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if the
    /// message no longer exists, or `AppError::Slack` on transport failure.
    fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Delete a previously posted message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the delete fails.
    fn delete(&self, handle: &MessageHandle)
        -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// A finished merge output ready for chat delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location of the merged file.
    pub path: PathBuf,
    /// File name presented to the user.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Playable video or plain document.
    pub format: UploadFormat,
    /// Optional preview frame.
    pub preview: Option<PathBuf>,
    /// Caption posted with the file.
    pub caption: String,
}

/// File delivery towards a single user.
///
/// Two transports exist because the chat service caps the simple path:
/// `upload_inline` buffers the payload in memory, `upload_streamed` streams
/// it from disk for large artifacts.
pub trait ArtifactUploader: Send + Sync {
    /// Upload a small artifact in one buffered request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` or `AppError::Io` on failure.
    fn upload_inline(
        &self,
        user_id: &str,
        artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Upload a large artifact by streaming it from disk.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` or `AppError::Io` on failure.
    fn upload_streamed(
        &self,
        user_id: &str,
        artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
