//! Unit tests for per-user merge queue admission, mutation, and the merge
//! guard.

use std::path::PathBuf;
use std::sync::Arc;

use merge_courier::models::item::{MediaInfo, QueueItem};
use merge_courier::queue::merge_queue::compatibility_warnings;
use merge_courier::queue::{AddOutcome, MergeQueue, MergeRejection, QueueError};

fn media(duration_secs: f64) -> MediaInfo {
    MediaInfo {
        duration_secs,
        width: 1920,
        height: 1080,
        fps: 30.0,
        codec: "h264".into(),
        has_audio: true,
    }
}

fn item(name: &str, id: &str, duration_secs: f64) -> QueueItem {
    QueueItem::new(
        id.into(),
        name.into(),
        PathBuf::from(format!("/nonexistent/{id}.mp4")),
        1024,
        media(duration_secs),
    )
}

async fn filled(count: usize) -> Arc<MergeQueue> {
    let queue = Arc::new(MergeQueue::new("U1", 20));
    for n in 0..count {
        let outcome = queue
            .add(item(&format!("clip{n}.mp4"), &format!("id{n}"), 10.0))
            .await;
        assert_eq!(outcome, AddOutcome::Accepted { position: n + 1 });
    }
    queue
}

async fn names(queue: &MergeQueue) -> Vec<String> {
    queue
        .snapshot()
        .await
        .into_iter()
        .map(|i| i.display_name)
        .collect()
}

#[tokio::test]
async fn accepted_items_keep_arrival_order() {
    let queue = filled(3).await;
    assert_eq!(names(&queue).await, ["clip0.mp4", "clip1.mp4", "clip2.mp4"]);
    assert_eq!(queue.len().await, 3);
    assert!((queue.total_duration().await - 30.0).abs() < f64::EPSILON);
    assert_eq!(queue.total_size().await, 3 * 1024);
}

#[tokio::test]
async fn rejects_zero_and_non_finite_duration() {
    let queue = MergeQueue::new("U1", 20);
    assert_eq!(
        queue.add(item("a.mp4", "a", 0.0)).await,
        AddOutcome::RejectedInvalidDuration
    );
    assert_eq!(
        queue.add(item("b.mp4", "b", -3.0)).await,
        AddOutcome::RejectedInvalidDuration
    );
    assert_eq!(
        queue.add(item("c.mp4", "c", f64::NAN)).await,
        AddOutcome::RejectedInvalidDuration
    );
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn rejects_duplicate_name_case_insensitively() {
    let queue = MergeQueue::new("U1", 20);
    assert!(queue.add(item("Holiday.MP4", "a", 5.0)).await.is_accepted());
    assert_eq!(
        queue.add(item("holiday.mp4", "b", 5.0)).await,
        AddOutcome::RejectedDuplicateName
    );
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn rejects_duplicate_identity_under_another_name() {
    let queue = MergeQueue::new("U1", 20);
    assert!(queue.add(item("first.mp4", "same", 5.0)).await.is_accepted());
    assert_eq!(
        queue.add(item("second.mp4", "same", 5.0)).await,
        AddOutcome::RejectedDuplicateIdentity
    );
}

#[tokio::test]
async fn name_check_runs_before_identity_check() {
    let queue = MergeQueue::new("U1", 20);
    assert!(queue.add(item("clip.mp4", "same", 5.0)).await.is_accepted());
    assert_eq!(
        queue.add(item("clip.mp4", "same", 5.0)).await,
        AddOutcome::RejectedDuplicateName
    );
}

#[tokio::test]
async fn twenty_first_item_is_rejected_for_capacity() {
    let queue = filled(20).await;
    assert_eq!(
        queue.add(item("extra.mp4", "extra", 5.0)).await,
        AddOutcome::RejectedCapacity
    );
    assert_eq!(queue.len().await, 20);
}

#[tokio::test]
async fn remove_shifts_later_items_and_reports_bad_index() {
    let queue = filled(3).await;
    let removed = queue.remove(1).await.expect("remove middle");
    assert_eq!(removed.display_name, "clip1.mp4");
    assert_eq!(names(&queue).await, ["clip0.mp4", "clip2.mp4"]);

    let err = queue.remove(5).await.expect_err("out of range");
    assert_eq!(err, QueueError::IndexOutOfRange { index: 5, len: 2 });
    assert_eq!(queue.len().await, 2);
}

#[tokio::test]
async fn remove_deletes_backing_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("clip.mp4");
    std::fs::write(&path, b"data").expect("write");

    let queue = MergeQueue::new("U1", 20);
    let entry = QueueItem::new("id".into(), "clip.mp4".into(), path.clone(), 4, media(5.0));
    assert!(queue.add(entry).await.is_accepted());

    queue.remove(0).await.expect("remove");
    assert!(!path.exists());
}

#[tokio::test]
async fn move_item_shifts_rather_than_swaps() {
    let queue = filled(4).await;
    queue.move_item(0, 2).await.expect("move");
    assert_eq!(
        names(&queue).await,
        ["clip1.mp4", "clip2.mp4", "clip0.mp4", "clip3.mp4"]
    );

    queue.move_item(3, 0).await.expect("move back");
    assert_eq!(
        names(&queue).await,
        ["clip3.mp4", "clip1.mp4", "clip2.mp4", "clip0.mp4"]
    );
}

#[tokio::test]
async fn move_item_to_same_position_is_a_no_op() {
    let queue = filled(3).await;
    queue.move_item(1, 1).await.expect("move");
    assert_eq!(names(&queue).await, ["clip0.mp4", "clip1.mp4", "clip2.mp4"]);
}

#[tokio::test]
async fn move_item_rejects_out_of_range_target() {
    let queue = filled(2).await;
    let err = queue.move_item(0, 2).await.expect_err("bad target");
    assert_eq!(err, QueueError::IndexOutOfRange { index: 2, len: 2 });
    assert_eq!(names(&queue).await, ["clip0.mp4", "clip1.mp4"]);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let queue = filled(3).await;
    assert_eq!(queue.clear().await, Ok(3));
    assert_eq!(queue.clear().await, Ok(0));
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn begin_merge_requires_two_items_and_leaves_guard_free() {
    let queue = filled(1).await;
    let err = queue.begin_merge().await.expect_err("one item is not enough");
    assert_eq!(err, MergeRejection::NotEnoughItems { queued: 1 });
    assert!(!queue.is_merging());
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn second_begin_merge_is_rejected_while_first_holds_guard() {
    let queue = filled(2).await;
    let permit = queue.begin_merge().await.expect("first merge starts");
    assert!(queue.is_merging());

    let err = queue.begin_merge().await.expect_err("second merge rejected");
    assert_eq!(err, MergeRejection::AlreadyRunning);
    assert_eq!(queue.len().await, 2, "rejection must not touch items");

    drop(permit);
    assert!(!queue.is_merging());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_begin_merge_has_exactly_one_winner() {
    let queue = filled(3).await;
    let mut tasks = Vec::new();
    for _ in 0..16 {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move { queue.begin_merge().await }));
    }

    let mut permits = Vec::new();
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("task joins") {
            Ok(permit) => permits.push(permit),
            Err(MergeRejection::AlreadyRunning) => rejected += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }
    assert_eq!(permits.len(), 1);
    assert_eq!(rejected, 15);
}

#[tokio::test]
async fn queue_is_frozen_while_merging() {
    let queue = filled(2).await;
    let _permit = queue.begin_merge().await.expect("merge starts");

    assert_eq!(
        queue.add(item("late.mp4", "late", 5.0)).await,
        AddOutcome::RejectedMergeInProgress
    );
    assert_eq!(queue.clear().await, Err(QueueError::MergeInProgress));
    assert_eq!(queue.remove(0).await.err(), Some(QueueError::MergeInProgress));
    assert_eq!(queue.move_item(0, 1).await, Err(QueueError::MergeInProgress));
    assert!(queue
        .update_settings(|s| s.output_name = "x.mp4".into())
        .await
        .is_err());
    assert_eq!(queue.len().await, 2);
}

#[tokio::test]
async fn finish_merge_clears_items_and_releases_guard() {
    let temp = tempfile::tempdir().expect("tempdir");
    let queue = Arc::new(MergeQueue::new("U1", 20));
    let mut paths = Vec::new();
    for n in 0..2 {
        let path = temp.path().join(format!("{n}.mp4"));
        std::fs::write(&path, b"data").expect("write");
        let entry = QueueItem::new(format!("id{n}"), format!("{n}.mp4"), path.clone(), 4, media(5.0));
        assert!(queue.add(entry).await.is_accepted());
        paths.push(path);
    }

    let permit = queue.begin_merge().await.expect("merge starts");
    assert_eq!(queue.finish_merge(permit).await, 2);

    assert!(queue.is_empty().await);
    assert!(!queue.is_merging());
    assert!(paths.iter().all(|p| !p.exists()));
    assert!(queue.add(item("next.mp4", "next", 5.0)).await.is_accepted());
}

#[tokio::test]
async fn replace_message_returns_previous_handle_and_clear_forgets_it() {
    use merge_courier::messaging::MessageHandle;

    let queue = filled(1).await;
    let first = MessageHandle {
        channel: "D1".into(),
        ts: "1.0".into(),
    };
    let second = MessageHandle {
        channel: "D1".into(),
        ts: "2.0".into(),
    };
    assert_eq!(queue.replace_message(Some(first.clone())).await, None);
    assert_eq!(queue.replace_message(Some(second.clone())).await, Some(first));
    assert_eq!(queue.message().await, Some(second));

    queue.clear().await.expect("clear");
    assert_eq!(queue.message().await, None);
}

#[test]
fn no_warnings_for_uniform_items() {
    let items = vec![item("a.mp4", "a", 5.0), item("b.mp4", "b", 5.0)];
    assert!(compatibility_warnings(&items).is_empty());
}

#[test]
fn warnings_name_each_differing_attribute() {
    let mut other = item("b.mp4", "b", 5.0);
    other.media.codec = "hevc".into();
    other.media.width = 1280;
    other.media.height = 720;
    other.media.fps = 25.0;
    other.media.has_audio = false;

    let warnings = compatibility_warnings(&[item("a.mp4", "a", 5.0), other]);
    assert_eq!(
        warnings,
        [
            "Different codecs detected (h264, hevc)",
            "Different resolutions detected (1280x720, 1920x1080)",
            "Different FPS detected (25, 30)",
            "Some videos missing audio",
        ]
    );
}

#[test]
fn single_item_has_no_warnings() {
    let mut only = item("a.mp4", "a", 5.0);
    only.media.has_audio = false;
    assert!(compatibility_warnings(&[only]).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_report_distinct_positions() {
    let queue = Arc::new(MergeQueue::new("U1", 20));
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.add(item(&format!("c{n}.mp4"), &format!("c{n}"), 5.0)).await })
        })
        .collect();

    let mut positions = Vec::new();
    for task in tasks {
        match task.await.expect("task joins") {
            AddOutcome::Accepted { position } => positions.push(position),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    positions.sort_unstable();
    assert_eq!(positions, (1..=8).collect::<Vec<_>>());
}
