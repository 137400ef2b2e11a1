//! Buffered chat upload for artifacts within the direct size limit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::delivery::{Delivered, DeliveryError, DeliveryRequest, DeliveryTarget, TransportStrategy};
use crate::messaging::ArtifactUploader;
use crate::models::settings::Destination;

/// Sends artifacts up to `limit_bytes` (inclusive) in one request.
pub struct DirectUpload {
    uploader: Arc<dyn ArtifactUploader>,
    limit_bytes: u64,
}

impl DirectUpload {
    /// Create the strategy.
    #[must_use]
    pub fn new(uploader: Arc<dyn ArtifactUploader>, limit_bytes: u64) -> Self {
        Self {
            uploader,
            limit_bytes,
        }
    }
}

impl TransportStrategy for DirectUpload {
    fn target(&self) -> DeliveryTarget {
        DeliveryTarget::InlineDirect
    }

    fn applies(&self, request: &DeliveryRequest) -> bool {
        request.destination == Destination::DirectMessaging
            && request.size_bytes() <= self.limit_bytes
    }

    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Delivered, DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            info!(user_id = %request.user_id, bytes = request.size_bytes(), "direct upload");
            self.uploader
                .upload_inline(&request.user_id, request.artifact.clone())
                .await
                .map_err(|err| DeliveryError::TransferFailed {
                    target: DeliveryTarget::InlineDirect,
                    reason: err.to_string(),
                })?;
            Ok(Delivered {
                target: DeliveryTarget::InlineDirect,
                remote: None,
            })
        })
    }
}
