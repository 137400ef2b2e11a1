//! Unit tests for `/merge` argument parsing.

use merge_courier::models::settings::{Destination, UploadFormat};
use merge_courier::slack::commands::{parse_command, MergeCommand};

#[test]
fn empty_text_shows_status() {
    assert_eq!(parse_command(""), Ok(MergeCommand::Status));
    assert_eq!(parse_command("   "), Ok(MergeCommand::Status));
}

#[test]
fn verbs_and_aliases() {
    assert_eq!(parse_command("queue"), Ok(MergeCommand::Status));
    assert_eq!(parse_command("check"), Ok(MergeCommand::Check));
    assert_eq!(parse_command("start"), Ok(MergeCommand::Start));
    assert_eq!(parse_command("MERGE"), Ok(MergeCommand::Start));
    assert_eq!(parse_command("clear"), Ok(MergeCommand::Clear));
    assert_eq!(parse_command("reset"), Ok(MergeCommand::Reset));
    assert_eq!(parse_command("help"), Ok(MergeCommand::Help));
}

#[test]
fn positions_are_one_based() {
    assert_eq!(parse_command("remove 1"), Ok(MergeCommand::Remove(0)));
    assert_eq!(parse_command("move 3 1"), Ok(MergeCommand::Move(2, 0)));
}

#[test]
fn zero_and_non_numeric_positions_are_rejected() {
    assert!(parse_command("remove 0").is_err());
    assert!(parse_command("remove two").is_err());
    assert!(parse_command("move 1").is_err());
    assert!(parse_command("remove").is_err());
}

#[test]
fn destination_and_format() {
    assert_eq!(
        parse_command("dest remote"),
        Ok(MergeCommand::Destination(Destination::RemoteStorage))
    );
    assert_eq!(
        parse_command("destination Direct"),
        Ok(MergeCommand::Destination(Destination::DirectMessaging))
    );
    assert_eq!(
        parse_command("format document"),
        Ok(MergeCommand::Format(UploadFormat::Document))
    );
    assert!(parse_command("dest ftp").is_err());
    assert!(parse_command("format gif").is_err());
}

#[test]
fn name_keeps_inner_spaces() {
    assert_eq!(
        parse_command("name summer trip"),
        Ok(MergeCommand::Name("summer trip".into()))
    );
    assert!(parse_command("name").is_err());
}

#[test]
fn unknown_verb_includes_usage() {
    let err = parse_command("explode").expect_err("unknown verb");
    assert!(err.contains("explode"));
    assert!(err.contains("/merge"));
}
