//! Per-user merge queue with admission rules and the merge guard.
//!
//! Items, delivery settings, and the live summary message handle sit behind
//! one async mutex. The merge guard is an [`AtomicBool`] flipped with
//! `compare_exchange` while that mutex is held, so admission checks and
//! guard acquisition never interleave. A successful [`MergeQueue::begin_merge`]
//! hands out a [`MergePermit`] whose `Drop` releases the guard.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::messaging::MessageHandle;
use crate::models::item::QueueItem;
use crate::models::settings::DeliverySettings;

/// Result of offering an item to a queue.
///
/// Any rejection leaves the queue untouched; the caller owns the rejected
/// item's file and must delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Item appended at one-based `position`.
    Accepted {
        /// Position of the new item, counted under the queue lock.
        position: usize,
    },
    /// Duration was zero, negative, or not finite.
    RejectedInvalidDuration,
    /// Another item already uses this display name (case-insensitive).
    RejectedDuplicateName,
    /// Another item already has this identity.
    RejectedDuplicateIdentity,
    /// The queue is full.
    RejectedCapacity,
    /// A merge is running; the queue is frozen until it finishes.
    RejectedMergeInProgress,
}

impl AddOutcome {
    /// Whether the item entered the queue.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl Display for AddOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted { position } => write!(f, "accepted at position {position}"),
            Self::RejectedInvalidDuration => write!(f, "rejected: video has no readable duration"),
            Self::RejectedDuplicateName => write!(f, "rejected: a video with this name is already queued"),
            Self::RejectedDuplicateIdentity => write!(f, "rejected: this video is already queued"),
            Self::RejectedCapacity => write!(f, "rejected: queue is full"),
            Self::RejectedMergeInProgress => write!(f, "rejected: a merge is in progress"),
        }
    }
}

/// Failure of a queue mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is frozen by a running merge.
    MergeInProgress,
    /// An index did not address an item.
    IndexOutOfRange {
        /// Offending zero-based index.
        index: usize,
        /// Queue length at the time of the call.
        len: usize,
    },
}

impl Display for QueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MergeInProgress => write!(f, "queue: a merge is in progress"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "queue: position {} is out of range (queue has {len})", index + 1)
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Reason a merge could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRejection {
    /// The guard is already held by a running merge.
    AlreadyRunning,
    /// Fewer than two items are queued.
    NotEnoughItems {
        /// Items currently queued.
        queued: usize,
    },
}

impl Display for MergeRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "merge: already running"),
            Self::NotEnoughItems { queued } => {
                write!(f, "merge: at least 2 videos are required ({queued} queued)")
            }
        }
    }
}

impl std::error::Error for MergeRejection {}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<QueueItem>,
    message: Option<MessageHandle>,
    settings: DeliverySettings,
}

/// Ordered collection of pending items for one user.
#[derive(Debug)]
pub struct MergeQueue {
    user_id: String,
    max_items: usize,
    state: Mutex<QueueState>,
    merging: AtomicBool,
}

/// Proof that the holder owns the queue's merge guard.
///
/// Dropping the permit releases the guard.
#[derive(Debug)]
pub struct MergePermit {
    queue: Arc<MergeQueue>,
}

impl MergePermit {
    /// Queue this permit guards.
    #[must_use]
    pub fn queue(&self) -> &Arc<MergeQueue> {
        &self.queue
    }
}

impl Drop for MergePermit {
    fn drop(&mut self) {
        self.queue.merging.store(false, Ordering::Release);
        debug!(user_id = %self.queue.user_id, "merge guard released");
    }
}

impl MergeQueue {
    /// Create an empty queue for `user_id` holding at most `max_items`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, max_items: usize) -> Self {
        Self {
            user_id: user_id.into(),
            max_items,
            state: Mutex::new(QueueState::default()),
            merging: AtomicBool::new(false),
        }
    }

    /// Owner of this queue.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Capacity of this queue.
    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Whether a merge currently holds the guard.
    #[must_use]
    pub fn is_merging(&self) -> bool {
        self.merging.load(Ordering::Acquire)
    }

    /// Offer `item` to the queue.
    ///
    /// Checks, in order: merge in progress, duration, display name,
    /// identity, capacity.
    pub async fn add(&self, item: QueueItem) -> AddOutcome {
        let mut state = self.state.lock().await;

        let outcome = if self.is_merging() {
            AddOutcome::RejectedMergeInProgress
        } else if !(item.duration_secs().is_finite() && item.duration_secs() > 0.0) {
            AddOutcome::RejectedInvalidDuration
        } else if state
            .items
            .iter()
            .any(|existing| existing.display_name.to_lowercase() == item.display_name.to_lowercase())
        {
            AddOutcome::RejectedDuplicateName
        } else if state.items.iter().any(|existing| existing.id == item.id) {
            AddOutcome::RejectedDuplicateIdentity
        } else if state.items.len() >= self.max_items {
            AddOutcome::RejectedCapacity
        } else {
            AddOutcome::Accepted {
                position: state.items.len() + 1,
            }
        };

        if outcome.is_accepted() {
            info!(
                user_id = %self.user_id,
                name = %item.display_name,
                %outcome,
                "item queued"
            );
            state.items.push(item);
        } else {
            warn!(user_id = %self.user_id, name = %item.display_name, %outcome, "item rejected");
        }
        outcome
    }

    /// Remove the item at zero-based `index` and delete its file.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MergeInProgress`] while merging, or
    /// [`QueueError::IndexOutOfRange`] for a bad index.
    pub async fn remove(&self, index: usize) -> Result<QueueItem, QueueError> {
        let removed = {
            let mut state = self.state.lock().await;
            if self.is_merging() {
                return Err(QueueError::MergeInProgress);
            }
            let len = state.items.len();
            if index >= len {
                return Err(QueueError::IndexOutOfRange { index, len });
            }
            state.items.remove(index)
        };
        delete_backing_file(&removed.path).await;
        info!(user_id = %self.user_id, name = %removed.display_name, "item removed");
        Ok(removed)
    }

    /// Move the item at `from` so it ends up at position `to`, shifting the
    /// items in between.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MergeInProgress`] while merging, or
    /// [`QueueError::IndexOutOfRange`] if either index is bad.
    pub async fn move_item(&self, from: usize, to: usize) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if self.is_merging() {
            return Err(QueueError::MergeInProgress);
        }
        let len = state.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(QueueError::IndexOutOfRange { index, len });
            }
        }
        let item = state.items.remove(from);
        state.items.insert(to, item);
        Ok(())
    }

    /// Empty the queue, delete every backing file, and forget the summary
    /// message. Returns the number of items removed.
    ///
    /// Clearing an empty queue is a no-op returning `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MergeInProgress`] while merging; nothing is
    /// touched in that case.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        let drained = {
            let mut state = self.state.lock().await;
            if self.is_merging() {
                return Err(QueueError::MergeInProgress);
            }
            state.message = None;
            std::mem::take(&mut state.items)
        };
        Ok(self.discard(drained).await)
    }

    /// Try to acquire the merge guard.
    ///
    /// Fails without side effects when fewer than two items are queued or
    /// when another merge already holds the guard.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeRejection`] describing why the merge cannot start.
    pub async fn begin_merge(self: &Arc<Self>) -> Result<MergePermit, MergeRejection> {
        let state = self.state.lock().await;
        if self.is_merging() {
            return Err(MergeRejection::AlreadyRunning);
        }
        let queued = state.items.len();
        if queued < 2 {
            return Err(MergeRejection::NotEnoughItems { queued });
        }
        self.merging
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MergeRejection::AlreadyRunning)?;
        drop(state);

        info!(user_id = %self.user_id, items = queued, "merge guard acquired");
        Ok(MergePermit {
            queue: Arc::clone(self),
        })
    }

    /// Terminate a merge: empty the queue, delete item files, forget the
    /// summary message, then release the guard.
    ///
    /// Returns the number of items removed.
    pub async fn finish_merge(&self, permit: MergePermit) -> usize {
        let drained = {
            let mut state = self.state.lock().await;
            state.message = None;
            std::mem::take(&mut state.items)
        };
        let removed = self.discard(drained).await;
        drop(permit);
        removed
    }

    /// Copy of the current items, in merge order.
    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.state.lock().await.items.clone()
    }

    /// Number of queued items.
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Whether the queue holds no items.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Sum of item sizes in bytes.
    pub async fn total_size(&self) -> u64 {
        self.state
            .lock()
            .await
            .items
            .iter()
            .map(|item| item.size_bytes)
            .sum()
    }

    /// Sum of item durations in seconds.
    pub async fn total_duration(&self) -> f64 {
        self.state
            .lock()
            .await
            .items
            .iter()
            .map(QueueItem::duration_secs)
            .sum()
    }

    /// Advisory warnings about attributes that differ across items.
    ///
    /// Empty for fewer than two items. Warnings never block a merge.
    pub async fn compatibility_warnings(&self) -> Vec<String> {
        compatibility_warnings(&self.state.lock().await.items)
    }

    /// Current delivery settings.
    pub async fn settings(&self) -> DeliverySettings {
        self.state.lock().await.settings.clone()
    }

    /// Apply `update` to the delivery settings.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MergeInProgress`] while merging.
    pub async fn update_settings(
        &self,
        update: impl FnOnce(&mut DeliverySettings),
    ) -> Result<DeliverySettings, QueueError> {
        let mut state = self.state.lock().await;
        if self.is_merging() {
            return Err(QueueError::MergeInProgress);
        }
        update(&mut state.settings);
        Ok(state.settings.clone())
    }

    /// Handle of the live summary message, if one is posted.
    pub async fn message(&self) -> Option<MessageHandle> {
        self.state.lock().await.message.clone()
    }

    /// Record a new summary message, returning the one it replaces.
    pub async fn replace_message(&self, handle: Option<MessageHandle>) -> Option<MessageHandle> {
        std::mem::replace(&mut self.state.lock().await.message, handle)
    }

    async fn discard(&self, items: Vec<QueueItem>) -> usize {
        let count = items.len();
        for item in &items {
            delete_backing_file(&item.path).await;
        }
        if count > 0 {
            info!(user_id = %self.user_id, items = count, "queue cleared");
        }
        count
    }
}

/// Advisory warnings for a set of items; see
/// [`MergeQueue::compatibility_warnings`].
#[must_use]
pub fn compatibility_warnings(items: &[QueueItem]) -> Vec<String> {
    if items.len() < 2 {
        return Vec::new();
    }

    let mut warnings = Vec::new();

    let codecs: BTreeSet<&str> = items.iter().map(|i| i.media.codec.as_str()).collect();
    if codecs.len() > 1 {
        warnings.push(format!(
            "Different codecs detected ({})",
            codecs.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let resolutions: BTreeSet<String> = items.iter().map(|i| i.media.resolution_label()).collect();
    if resolutions.len() > 1 {
        warnings.push(format!(
            "Different resolutions detected ({})",
            resolutions.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let rates: BTreeSet<String> = items.iter().map(|i| i.media.fps_label()).collect();
    if rates.len() > 1 {
        warnings.push(format!(
            "Different FPS detected ({})",
            rates.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let audio: BTreeSet<bool> = items.iter().map(|i| i.media.has_audio).collect();
    if audio.len() > 1 {
        warnings.push("Some videos missing audio".to_owned());
    }

    warnings
}

async fn delete_backing_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to delete queued file"),
    }
}
