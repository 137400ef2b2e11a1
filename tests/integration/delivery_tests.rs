//! Remote-storage delivery through the executor.

use merge_courier::delivery::{DeliveryError, DeliveryTarget};
use merge_courier::models::settings::Destination;
use merge_courier::orchestrator::MergeError;

use super::test_helpers::{Harness, RecordingUploader, ScriptedEngine};

#[tokio::test]
#[serial_test::serial]
async fn remote_without_configuration_fails_before_any_transfer() {
    let harness = Harness::new(ScriptedEngine::producing(2048));
    let (queue, paths) = harness.queue_with("U1", &["a.mp4", "b.mp4"]).await;
    queue
        .update_settings(|s| s.destination = Destination::RemoteStorage)
        .await
        .expect("settings update");
    let status = harness.status("U1").await;

    let permit = queue.begin_merge().await.expect("merge starts");
    let err = harness
        .executor
        .run(permit, Some(status))
        .await
        .expect_err("delivery fails");

    let expected = harness.config.rclone_config_path("U1");
    assert_eq!(
        err,
        MergeError::Delivery(DeliveryError::ConfigurationMissing { path: expected })
    );
    assert!(harness.uploader.uploads().is_empty(), "no chat fallback");

    let last_edit = harness.messenger.edits().pop().expect("failure edit");
    assert!(last_edit.contains("Remote storage is not configured"));
    assert!(queue.is_empty().await);
    assert!(!queue.is_merging());
    assert!(paths.iter().all(|p| !p.exists()));
}

#[tokio::test]
#[serial_test::serial]
async fn configuration_without_remote_is_invalid() {
    let harness = Harness::new(ScriptedEngine::producing(2048));
    let conf = harness.config.rclone_config_path("U1");
    std::fs::create_dir_all(conf.parent().expect("parent")).expect("mkdir");
    std::fs::write(&conf, "type = drive\n").expect("write conf");

    let (queue, _paths) = harness.queue_with("U1", &["a.mp4", "b.mp4"]).await;
    queue
        .update_settings(|s| s.destination = Destination::RemoteStorage)
        .await
        .expect("settings update");

    let permit = queue.begin_merge().await.expect("merge starts");
    let err = harness.executor.run(permit, None).await.expect_err("delivery fails");
    assert!(matches!(
        err,
        MergeError::Delivery(DeliveryError::ConfigurationInvalid(_))
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn missing_transfer_tool_is_a_transfer_failure() {
    let harness = Harness::new(ScriptedEngine::producing(2048));
    let conf = harness.config.rclone_config_path("U1");
    std::fs::create_dir_all(conf.parent().expect("parent")).expect("mkdir");
    std::fs::write(&conf, "[gdrive]\ntype = drive\n").expect("write conf");

    let (queue, _paths) = harness.queue_with("U1", &["a.mp4", "b.mp4"]).await;
    queue
        .update_settings(|s| s.destination = Destination::RemoteStorage)
        .await
        .expect("settings update");

    let permit = queue.begin_merge().await.expect("merge starts");
    let err = harness.executor.run(permit, None).await.expect_err("delivery fails");
    assert!(matches!(
        err,
        MergeError::Delivery(DeliveryError::TransferFailed {
            target: DeliveryTarget::RemoteStorage,
            ..
        })
    ));
}

#[cfg(unix)]
mod with_stand_in_tool {
    use super::*;
    use crate::integration::test_helpers::{test_config, write_script};

    fn harness_with_rclone(body: &str) -> Harness {
        let root = tempfile::tempdir().expect("tempdir");
        let bin = root.path().join("bin");
        std::fs::create_dir_all(&bin).expect("bin dir");
        let script = write_script(&bin, "rclone", body);

        let mut config = test_config(root.path());
        config.tools.rclone = script.to_string_lossy().into_owned();
        Harness::build(
            root,
            config,
            ScriptedEngine::producing(2048),
            RecordingUploader::default(),
        )
    }

    fn configure_remote(harness: &Harness, user_id: &str, remote: &str) {
        let conf = harness.config.rclone_config_path(user_id);
        std::fs::create_dir_all(conf.parent().expect("parent")).expect("mkdir");
        std::fs::write(&conf, format!("[{remote}]\ntype = drive\n")).expect("write conf");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn successful_transfer_reports_the_remote() {
        let harness = harness_with_rclone(
            r#"echo "Transferred:   1 KiB / 2 KiB, 50%, 1 KiB/s, ETA 1s"
echo "Transferred:   2 KiB / 2 KiB, 100%, 1 KiB/s, ETA 0s"
exit 0"#,
        );
        configure_remote(&harness, "U1", "gdrive");
        let (queue, _paths) = harness.queue_with("U1", &["a.mp4", "b.mp4"]).await;
        queue
            .update_settings(|s| s.destination = Destination::RemoteStorage)
            .await
            .expect("settings update");
        let status = harness.status("U1").await;

        let permit = queue.begin_merge().await.expect("merge starts");
        let outcome = harness
            .executor
            .run(permit, Some(status))
            .await
            .expect("delivery succeeds");

        assert_eq!(outcome.delivered.target, DeliveryTarget::RemoteStorage);
        assert_eq!(outcome.delivered.remote.as_deref(), Some("gdrive"));
        assert!(harness.uploader.uploads().is_empty());

        let edits = harness.messenger.edits();
        assert!(edits.iter().any(|e| e.contains("Uploading to gdrive")), "{edits:?}");
        assert!(edits.last().is_some_and(|e| e.contains("Uploaded to gdrive")), "{edits:?}");
        assert!(harness.messenger.deleted().is_empty());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn failing_transfer_tool_is_final() {
        let harness = harness_with_rclone("echo 'Failed to copy: quota exceeded' >&2\nexit 1");
        configure_remote(&harness, "U1", "gdrive");
        let (queue, _paths) = harness.queue_with("U1", &["a.mp4", "b.mp4"]).await;
        queue
            .update_settings(|s| s.destination = Destination::RemoteStorage)
            .await
            .expect("settings update");

        let permit = queue.begin_merge().await.expect("merge starts");
        let err = harness.executor.run(permit, None).await.expect_err("delivery fails");

        assert!(matches!(
            err,
            MergeError::Delivery(DeliveryError::TransferFailed {
                target: DeliveryTarget::RemoteStorage,
                ..
            })
        ));
        assert!(harness.uploader.uploads().is_empty(), "no chat fallback");
        assert!(queue.is_empty().await);
    }
}
