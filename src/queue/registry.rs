//! Process-wide map from user identity to merge queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::queue::merge_queue::{MergeQueue, QueueError};

/// Lazily populated registry of per-user queues.
///
/// The map lock covers lookup and insertion only; queue operations run on
/// the returned `Arc` after it is released, so users never contend with
/// each other.
#[derive(Debug)]
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, Arc<MergeQueue>>>,
    max_items: usize,
}

impl QueueRegistry {
    /// Create an empty registry whose queues hold at most `max_items`.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_items,
        }
    }

    /// Queue for `user_id`, created on first reference.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<MergeQueue> {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(user_id.to_owned()).or_insert_with(|| {
            info!(user_id, "creating merge queue");
            Arc::new(MergeQueue::new(user_id, self.max_items))
        });
        Arc::clone(queue)
    }

    /// Queue for `user_id` if one exists.
    pub async fn get(&self, user_id: &str) -> Option<Arc<MergeQueue>> {
        self.queues.lock().await.get(user_id).cloned()
    }

    /// Clear and forget the queue for `user_id`.
    ///
    /// Returns `Ok(false)` if the user had no queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MergeInProgress`] if the queue is merging; the
    /// queue stays registered in that case.
    pub async fn remove(&self, user_id: &str) -> Result<bool, QueueError> {
        let Some(queue) = self.get(user_id).await else {
            return Ok(false);
        };
        queue.clear().await?;

        let mut queues = self.queues.lock().await;
        // A concurrent reset may already have replaced or dropped the entry.
        if queues
            .get(user_id)
            .is_some_and(|current| Arc::ptr_eq(current, &queue))
        {
            queues.remove(user_id);
        }
        info!(user_id, "merge queue removed");
        Ok(true)
    }

    /// Number of registered queues.
    pub async fn len(&self) -> usize {
        self.queues.lock().await.len()
    }

    /// Whether no queues are registered.
    pub async fn is_empty(&self) -> bool {
        self.queues.lock().await.is_empty()
    }
}
