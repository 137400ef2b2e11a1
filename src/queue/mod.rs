//! Per-user merge queues and the registry that owns them.

pub mod merge_queue;
pub mod registry;

pub use merge_queue::{AddOutcome, MergePermit, MergeQueue, MergeRejection, QueueError};
pub use registry::QueueRegistry;
