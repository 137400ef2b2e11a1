//! Upload intake: turns a received file into a queued item.
//!
//! Files with an unsupported extension are dropped before probing. Every
//! rejection deletes the received file; acceptance replaces the user's
//! live summary message with a fresh one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::media::probe::MediaProbe;
use crate::messaging::Messenger;
use crate::models::item::{derive_identity, QueueItem};
use crate::queue::{AddOutcome, MergeQueue, QueueRegistry};
use crate::slack::text;
use crate::{AppError, Result};

/// Container extensions accepted for merging (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m3u8", "m4v", "mpg", "mpeg", "3gp", "ogv",
    "ts", "vob",
];

/// Whether `name` ends in an accepted container extension.
#[must_use]
pub fn is_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

/// A file received from the chat service, already on local disk.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Sender.
    pub user_id: String,
    /// Local copy of the file.
    pub path: PathBuf,
    /// Name the sender gave the file.
    pub display_name: String,
    /// Size the chat service reported.
    pub declared_size: u64,
    /// Identifier of the event that delivered the file.
    pub submission_ref: String,
}

/// Result of [`Intake::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The item was queued at 1-based `position`.
    Queued {
        /// Position of the new item.
        position: usize,
    },
    /// The extension is not an accepted container.
    UnsupportedFormat,
    /// The queue refused the item.
    Rejected(AddOutcome),
}

/// Admission pipeline shared by every inbound upload.
pub struct Intake {
    registry: Arc<QueueRegistry>,
    probe: MediaProbe,
    messenger: Arc<dyn Messenger>,
}

impl Intake {
    /// Create the intake pipeline.
    #[must_use]
    pub fn new(registry: Arc<QueueRegistry>, probe: MediaProbe, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            registry,
            probe,
            messenger,
        }
    }

    /// Probe, identify, and queue `upload`, telling the user the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read for identity
    /// derivation. The file is deleted in that case too.
    pub async fn accept(&self, upload: Upload) -> Result<IntakeOutcome> {
        if !is_allowed_extension(&upload.display_name) {
            info!(user_id = %upload.user_id, name = %upload.display_name, "unsupported format");
            discard(&upload.path).await;
            self.tell(
                &upload.user_id,
                &format!(
                    "\u{274c} {} is not a supported video format. Accepted: {}",
                    upload.display_name,
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            )
            .await;
            return Ok(IntakeOutcome::UnsupportedFormat);
        }

        let item = match self.build_item(&upload).await {
            Ok(item) => item,
            Err(err) => {
                discard(&upload.path).await;
                return Err(err);
            }
        };

        let queue = self.registry.get_or_create(&upload.user_id).await;
        let outcome = queue.add(item).await;
        let AddOutcome::Accepted { position } = outcome else {
            discard(&upload.path).await;
            self.tell(
                &upload.user_id,
                &format!("\u{26a0}\u{fe0f} {}: {}", upload.display_name, rejection_reason(outcome)),
            )
            .await;
            return Ok(IntakeOutcome::Rejected(outcome));
        };

        self.refresh_summary(&queue).await;
        Ok(IntakeOutcome::Queued { position })
    }

    /// Post a fresh summary for `queue` and delete the one it replaces.
    pub async fn refresh_summary(&self, queue: &MergeQueue) {
        let body = text::queue_summary(&queue.snapshot().await, queue.max_items());
        let posted = match self.messenger.notify(queue.user_id(), &body).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(user_id = %queue.user_id(), %err, "failed to post queue summary");
                None
            }
        };
        let Some(handle) = posted else { return };

        if let Some(previous) = queue.replace_message(Some(handle)).await {
            if let Err(err) = self.messenger.delete(&previous).await {
                debug!(%err, "previous summary already gone");
            }
        }
    }

    async fn build_item(&self, upload: &Upload) -> Result<QueueItem> {
        let size_bytes = tokio::fs::metadata(&upload.path)
            .await
            .map_or(upload.declared_size, |meta| meta.len());
        let media = self.probe.probe(&upload.path).await;

        let path = upload.path.clone();
        let submission_ref = upload.submission_ref.clone();
        let id = tokio::task::spawn_blocking(move || derive_identity(&path, &submission_ref))
            .await
            .map_err(|err| AppError::Io(format!("identity task panicked: {err}")))??;

        Ok(QueueItem::new(
            id,
            upload.display_name.clone(),
            upload.path.clone(),
            size_bytes,
            media,
        ))
    }

    async fn tell(&self, user_id: &str, body: &str) {
        if let Err(err) = self.messenger.notify(user_id, body).await {
            warn!(user_id, %err, "failed to notify user");
        }
    }
}

/// User-facing explanation of a queue rejection.
#[must_use]
pub fn rejection_reason(outcome: AddOutcome) -> &'static str {
    match outcome {
        AddOutcome::Accepted { .. } => "queued",
        AddOutcome::RejectedInvalidDuration => "could not read the video duration; the file may be corrupt",
        AddOutcome::RejectedDuplicateName => "a video with this name is already queued",
        AddOutcome::RejectedDuplicateIdentity => "this video is already queued",
        AddOutcome::RejectedCapacity => "the queue is full; merge or remove videos first",
        AddOutcome::RejectedMergeInProgress => "a merge is running; wait for it to finish",
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to delete rejected upload"),
    }
}
