//! Streamed chat upload for artifacts above the direct size limit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::delivery::{Delivered, DeliveryError, DeliveryRequest, DeliveryTarget, TransportStrategy};
use crate::messaging::ArtifactUploader;
use crate::models::settings::Destination;

/// Streams artifacts strictly larger than `limit_bytes` from disk.
pub struct HighCapacityUpload {
    uploader: Arc<dyn ArtifactUploader>,
    limit_bytes: u64,
}

impl HighCapacityUpload {
    /// Create the strategy.
    #[must_use]
    pub fn new(uploader: Arc<dyn ArtifactUploader>, limit_bytes: u64) -> Self {
        Self {
            uploader,
            limit_bytes,
        }
    }
}

impl TransportStrategy for HighCapacityUpload {
    fn target(&self) -> DeliveryTarget {
        DeliveryTarget::HighCapacity
    }

    fn applies(&self, request: &DeliveryRequest) -> bool {
        request.destination == Destination::DirectMessaging
            && request.size_bytes() > self.limit_bytes
    }

    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Delivered, DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                user_id = %request.user_id,
                bytes = request.size_bytes(),
                "high-capacity upload"
            );
            self.uploader
                .upload_streamed(&request.user_id, request.artifact.clone())
                .await
                .map_err(|err| DeliveryError::TransferFailed {
                    target: DeliveryTarget::HighCapacity,
                    reason: err.to_string(),
                })?;
            Ok(Delivered {
                target: DeliveryTarget::HighCapacity,
                remote: None,
            })
        })
    }
}
