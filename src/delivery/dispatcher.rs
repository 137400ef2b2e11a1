//! First-match transport selection and supervision.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::delivery::direct::DirectUpload;
use crate::delivery::high_capacity::HighCapacityUpload;
use crate::delivery::remote_storage::RemoteStorageUpload;
use crate::delivery::{Delivered, DeliveryError, DeliveryRequest, DeliveryTarget, TransportStrategy};
use crate::messaging::{ArtifactUploader, Messenger};
use crate::models::settings::Destination;

/// Routes each artifact to the first applicable transport.
pub struct DeliveryDispatcher {
    strategies: Vec<Box<dyn TransportStrategy>>,
}

impl DeliveryDispatcher {
    /// Build a dispatcher over `strategies`, evaluated in order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn TransportStrategy>>) -> Self {
        Self { strategies }
    }

    /// Standard transport order: remote storage, direct, high-capacity.
    #[must_use]
    pub fn standard(
        config: &GlobalConfig,
        uploader: &Arc<dyn ArtifactUploader>,
        messenger: &Arc<dyn Messenger>,
    ) -> Self {
        let limit = config.limits.direct_upload_limit_bytes;
        Self::new(vec![
            Box::new(RemoteStorageUpload::new(
                config.tools.rclone.clone(),
                config.paths.userdata_dir.clone(),
                config.timeouts.transfer(),
                config.progress_throttle(),
                Arc::clone(messenger),
            )),
            Box::new(DirectUpload::new(Arc::clone(uploader), limit)),
            Box::new(HighCapacityUpload::new(Arc::clone(uploader), limit)),
        ])
    }

    /// Transport that would carry `request`, if any applies.
    #[must_use]
    pub fn select(&self, request: &DeliveryRequest) -> Option<DeliveryTarget> {
        self.strategy_for(request).map(|s| s.target())
    }

    /// Deliver `request` through the first applicable transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's [`DeliveryError`]; no other transport is
    /// tried after a failure.
    pub async fn dispatch(&self, request: &DeliveryRequest) -> Result<Delivered, DeliveryError> {
        let Some(strategy) = self.strategy_for(request) else {
            warn!(user_id = %request.user_id, "no transport accepts artifact");
            return Err(DeliveryError::TransferFailed {
                target: fallback_target(request.destination),
                reason: "no transport accepts this artifact".into(),
            });
        };

        info!(
            user_id = %request.user_id,
            transport = %strategy.target(),
            bytes = request.size_bytes(),
            "dispatching artifact"
        );
        let result = strategy.deliver(request).await;
        if let Err(err) = &result {
            warn!(user_id = %request.user_id, %err, "delivery failed");
        }
        result
    }

    fn strategy_for(&self, request: &DeliveryRequest) -> Option<&dyn TransportStrategy> {
        self.strategies
            .iter()
            .map(Box::as_ref)
            .find(|s| s.applies(request))
    }
}

/// Pure selection rule for the standard transport order.
///
/// Remote storage ignores size; direct messaging switches to the
/// high-capacity path strictly above `direct_limit_bytes`.
#[must_use]
pub fn select_target(destination: Destination, size_bytes: u64, direct_limit_bytes: u64) -> DeliveryTarget {
    match destination {
        Destination::RemoteStorage => DeliveryTarget::RemoteStorage,
        Destination::DirectMessaging if size_bytes > direct_limit_bytes => {
            DeliveryTarget::HighCapacity
        }
        Destination::DirectMessaging => DeliveryTarget::InlineDirect,
    }
}

fn fallback_target(destination: Destination) -> DeliveryTarget {
    match destination {
        Destination::RemoteStorage => DeliveryTarget::RemoteStorage,
        Destination::DirectMessaging => DeliveryTarget::InlineDirect,
    }
}
