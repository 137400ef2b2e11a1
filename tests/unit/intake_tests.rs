//! Unit tests for upload admission helpers.

use merge_courier::orchestrator::intake::{is_allowed_extension, rejection_reason};
use merge_courier::orchestrator::remote_setup::is_remote_config;
use merge_courier::queue::AddOutcome;
use merge_courier::slack::files::safe_file_name;

#[test]
fn common_containers_are_accepted() {
    for name in ["a.mp4", "b.MKV", "c.mov", "d.webm", "e.ts", "f.m4v", "g.3gp"] {
        assert!(is_allowed_extension(name), "{name}");
    }
}

#[test]
fn other_files_are_refused() {
    for name in ["notes.txt", "photo.jpg", "archive.mp4.zip", "noextension", ".mp4"] {
        assert!(!is_allowed_extension(name), "{name}");
    }
}

#[test]
fn every_rejection_has_a_reason() {
    for outcome in [
        AddOutcome::RejectedInvalidDuration,
        AddOutcome::RejectedDuplicateName,
        AddOutcome::RejectedDuplicateIdentity,
        AddOutcome::RejectedCapacity,
        AddOutcome::RejectedMergeInProgress,
    ] {
        assert!(!rejection_reason(outcome).is_empty());
    }
    assert!(rejection_reason(AddOutcome::RejectedCapacity).contains("full"));
}

#[test]
fn shared_file_names_are_made_safe() {
    assert_eq!(safe_file_name("clip.mp4"), "clip.mp4");
    assert_eq!(safe_file_name("../../etc/clip.mp4"), "clip.mp4");
    assert_eq!(safe_file_name("dir\\win.mov"), "win.mov");
    assert_eq!(safe_file_name("bad\u{0}\nname.mp4"), "badname.mp4");
    assert_eq!(safe_file_name(".."), "upload");
    assert_eq!(safe_file_name(""), "upload");
}

#[test]
fn conf_files_are_routed_to_remote_setup() {
    assert!(is_remote_config("rclone.conf"));
    assert!(is_remote_config("My Drive.CONF"));
    assert!(!is_remote_config("rclone.conf.txt"));
    assert!(!is_remote_config("clip.mp4"));
    assert!(!is_allowed_extension("rclone.conf"));
}
