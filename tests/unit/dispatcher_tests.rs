//! Unit tests for transport selection.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use merge_courier::delivery::direct::DirectUpload;
use merge_courier::delivery::dispatcher::select_target;
use merge_courier::delivery::high_capacity::HighCapacityUpload;
use merge_courier::delivery::remote_storage::RemoteStorageUpload;
use merge_courier::delivery::{DeliveryDispatcher, DeliveryRequest, DeliveryTarget};
use merge_courier::messaging::{Artifact, ArtifactUploader, MessageHandle, Messenger};
use merge_courier::models::settings::{Destination, UploadFormat};
use merge_courier::Result;

const LIMIT: u64 = 50 * 1024 * 1024;

struct Silent;

impl ArtifactUploader for Silent {
    fn upload_inline(
        &self,
        _user_id: &str,
        _artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn upload_streamed(
        &self,
        _user_id: &str,
        _artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

impl Messenger for Silent {
    fn notify(
        &self,
        _user_id: &str,
        _text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageHandle>> + Send + '_>> {
        Box::pin(async {
            Ok(MessageHandle {
                channel: "D".into(),
                ts: "1".into(),
            })
        })
    }

    fn edit(
        &self,
        _handle: &MessageHandle,
        _text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn delete(&self, _handle: &MessageHandle) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

fn dispatcher() -> DeliveryDispatcher {
    let silent = Arc::new(Silent);
    DeliveryDispatcher::new(vec![
        Box::new(RemoteStorageUpload::new(
            "rclone",
            "/nonexistent",
            Duration::from_secs(1),
            Duration::from_secs(1),
            silent.clone(),
        )),
        Box::new(DirectUpload::new(silent.clone(), LIMIT)),
        Box::new(HighCapacityUpload::new(silent, LIMIT)),
    ])
}

fn request(destination: Destination, size_bytes: u64) -> DeliveryRequest {
    DeliveryRequest {
        user_id: "U1".into(),
        artifact: Artifact {
            path: PathBuf::from("/tmp/out.mp4"),
            name: "out.mp4".into(),
            size_bytes,
            format: UploadFormat::Video,
            preview: None,
            caption: String::new(),
        },
        destination,
        status: None,
    }
}

#[test]
fn exactly_at_limit_goes_direct() {
    assert_eq!(
        select_target(Destination::DirectMessaging, LIMIT, LIMIT),
        DeliveryTarget::InlineDirect
    );
    assert_eq!(
        dispatcher().select(&request(Destination::DirectMessaging, LIMIT)),
        Some(DeliveryTarget::InlineDirect)
    );
}

#[test]
fn one_byte_over_limit_goes_high_capacity() {
    assert_eq!(
        select_target(Destination::DirectMessaging, LIMIT + 1, LIMIT),
        DeliveryTarget::HighCapacity
    );
    assert_eq!(
        dispatcher().select(&request(Destination::DirectMessaging, LIMIT + 1)),
        Some(DeliveryTarget::HighCapacity)
    );
}

#[test]
fn remote_storage_ignores_size() {
    for size in [1, LIMIT, LIMIT + 1, 4 * 1024 * 1024 * 1024] {
        assert_eq!(
            select_target(Destination::RemoteStorage, size, LIMIT),
            DeliveryTarget::RemoteStorage
        );
        assert_eq!(
            dispatcher().select(&request(Destination::RemoteStorage, size)),
            Some(DeliveryTarget::RemoteStorage)
        );
    }
}

#[test]
fn dispatcher_and_pure_rule_agree() {
    let dispatcher = dispatcher();
    for destination in [Destination::DirectMessaging, Destination::RemoteStorage] {
        for size in [0, 1, LIMIT - 1, LIMIT, LIMIT + 1, u64::MAX] {
            assert_eq!(
                dispatcher.select(&request(destination, size)),
                Some(select_target(destination, size, LIMIT)),
                "{destination:?} / {size}"
            );
        }
    }
}

#[tokio::test]
async fn empty_dispatcher_reports_failure_instead_of_panicking() {
    let empty = DeliveryDispatcher::new(Vec::new());
    let req = request(Destination::DirectMessaging, 10);
    assert_eq!(empty.select(&req), None);
    assert!(empty.dispatch(&req).await.is_err());
}

#[test]
fn target_labels() {
    assert_eq!(DeliveryTarget::InlineDirect.to_string(), "direct upload");
    assert_eq!(DeliveryTarget::HighCapacity.to_string(), "high-capacity upload");
    assert_eq!(DeliveryTarget::RemoteStorage.to_string(), "remote storage");
}
