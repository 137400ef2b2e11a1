//! `/merge` slash command router.
//!
//! Parsing is pure ([`parse_command`]) and execution only needs an
//! [`AppState`], so both are testable without a Slack connection. Positions
//! typed by users are 1-based.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector, SlackCommandEvent,
    SlackCommandEventResponse, SlackMessageContent, SlackMessageResponseType,
};
use tracing::{debug, info, warn};

use crate::models::settings::{normalize_output_name, Destination, UploadFormat};
use crate::queue::MergeRejection;
use crate::slack::{text, AppState};

/// A parsed `/merge` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeCommand {
    /// Show the queue.
    Status,
    /// Show the pre-merge compatibility report.
    Check,
    /// Start merging.
    Start,
    /// Empty the queue.
    Clear,
    /// Drop the queue from the registry.
    Reset,
    /// Remove the item at a zero-based index.
    Remove(usize),
    /// Move an item between zero-based indices.
    Move(usize, usize),
    /// Choose the delivery destination.
    Destination(Destination),
    /// Choose the chat upload format.
    Format(UploadFormat),
    /// Choose the output file name (raw, normalised on apply).
    Name(String),
    /// Show usage.
    Help,
}

/// Parse the text following `/merge`.
///
/// # Errors
///
/// Returns a user-facing message for malformed arguments.
pub fn parse_command(raw: &str) -> std::result::Result<MergeCommand, String> {
    let mut words = raw.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(MergeCommand::Status);
    };
    let rest: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "status" | "queue" => Ok(MergeCommand::Status),
        "check" => Ok(MergeCommand::Check),
        "start" | "merge" => Ok(MergeCommand::Start),
        "clear" => Ok(MergeCommand::Clear),
        "reset" => Ok(MergeCommand::Reset),
        "remove" => match rest.as_slice() {
            [pos] => Ok(MergeCommand::Remove(parse_position(pos)?)),
            _ => Err("usage: `/merge remove <n>`".into()),
        },
        "move" => match rest.as_slice() {
            [from, to] => Ok(MergeCommand::Move(parse_position(from)?, parse_position(to)?)),
            _ => Err("usage: `/merge move <from> <to>`".into()),
        },
        "dest" | "destination" => match rest.as_slice() {
            [value] if value.eq_ignore_ascii_case("direct") => {
                Ok(MergeCommand::Destination(Destination::DirectMessaging))
            }
            [value] if value.eq_ignore_ascii_case("remote") => {
                Ok(MergeCommand::Destination(Destination::RemoteStorage))
            }
            _ => Err("usage: `/merge dest direct|remote`".into()),
        },
        "format" => match rest.as_slice() {
            [value] if value.eq_ignore_ascii_case("video") => {
                Ok(MergeCommand::Format(UploadFormat::Video))
            }
            [value] if value.eq_ignore_ascii_case("document") => {
                Ok(MergeCommand::Format(UploadFormat::Document))
            }
            _ => Err("usage: `/merge format video|document`".into()),
        },
        "name" => {
            if rest.is_empty() {
                Err("usage: `/merge name <file>`".into())
            } else {
                Ok(MergeCommand::Name(rest.join(" ")))
            }
        }
        "help" => Ok(MergeCommand::Help),
        other => Err(format!("unknown subcommand `{other}`\n\n{}", text::help())),
    }
}

fn parse_position(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("`{raw}` is not a queue position (positions start at 1)")),
    }
}

/// Execute `command` for `user_id`, returning the reply text.
pub async fn execute(state: &AppState, user_id: &str, command: MergeCommand) -> String {
    let queue = state.registry.get_or_create(user_id).await;

    match command {
        MergeCommand::Status => text::queue_summary(&queue.snapshot().await, queue.max_items()),
        MergeCommand::Check => {
            let items = queue.snapshot().await;
            if items.len() < 2 {
                return "Add at least 2 videos before merging.".into();
            }
            text::merge_report(&items, &queue.compatibility_warnings().await)
        }
        MergeCommand::Start => start_merge(state, user_id).await,
        MergeCommand::Clear => {
            let message = queue.message().await;
            match queue.clear().await {
                Ok(removed) => {
                    if let Some(handle) = message {
                        if let Err(err) = state.messenger.delete(&handle).await {
                            debug!(user_id, %err, "queue summary already gone");
                        }
                    }
                    format!("\u{1f5d1}\u{fe0f} Queue cleared ({removed} videos removed).")
                }
                Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
            }
        }
        MergeCommand::Reset => match state.registry.remove(user_id).await {
            Ok(_) => "\u{1f504} Session reset. Send videos to start a new queue.".into(),
            Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
        },
        MergeCommand::Remove(index) => match queue.remove(index).await {
            Ok(item) => format!("Removed {}.", item.display_name),
            Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
        },
        MergeCommand::Move(from, to) => match queue.move_item(from, to).await {
            Ok(()) => text::queue_summary(&queue.snapshot().await, queue.max_items()),
            Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
        },
        MergeCommand::Destination(destination) => {
            match queue.update_settings(|s| s.destination = destination).await {
                Ok(_) => match destination {
                    Destination::DirectMessaging => "Merged videos will be sent here.".into(),
                    Destination::RemoteStorage => {
                        "Merged videos will be copied to your remote storage.".into()
                    }
                },
                Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
            }
        }
        MergeCommand::Format(format) => match queue.update_settings(|s| s.format = format).await {
            Ok(_) => match format {
                UploadFormat::Video => "Merged videos will be uploaded as video.".into(),
                UploadFormat::Document => "Merged videos will be uploaded as a document.".into(),
            },
            Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
        },
        MergeCommand::Name(raw) => {
            let name = normalize_output_name(&raw);
            let applied = name.clone();
            match queue.update_settings(move |s| s.output_name = applied).await {
                Ok(_) => format!("Output name set to {name}."),
                Err(err) => format!("\u{26a0}\u{fe0f} {err}"),
            }
        }
        MergeCommand::Help => text::help(),
    }
}

async fn start_merge(state: &AppState, user_id: &str) -> String {
    let queue = state.registry.get_or_create(user_id).await;
    let permit = match queue.begin_merge().await {
        Ok(permit) => permit,
        Err(MergeRejection::AlreadyRunning) => {
            return "\u{23f3} A merge is already running for your queue.".into();
        }
        Err(MergeRejection::NotEnoughItems { queued }) => {
            return format!("Add at least 2 videos before merging ({queued} queued).");
        }
    };

    let items = queue.snapshot().await;
    let status = match state
        .messenger
        .notify(user_id, &text::stage_preparing(items.len()))
        .await
    {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(user_id, %err, "failed to post merge status; continuing without it");
            None
        }
    };

    let warnings = queue.compatibility_warnings().await;
    state.executor.spawn(permit, status);

    let mut reply = format!("\u{1f500} Merging {} videos.", items.len());
    if !warnings.is_empty() {
        reply.push_str("\n\u{26a0}\u{fe0f} ");
        reply.push_str(&warnings.join("; "));
        reply.push_str(". Attempting a fast stream-copy merge anyway.");
    }
    reply
}

/// Handle incoming slash commands routed via Socket Mode.
///
/// # Errors
///
/// Returns an error if the command response cannot be constructed.
pub async fn handle_command(
    event: SlackCommandEvent,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::AnyStdResult<SlackCommandEventResponse> {
    let user_id = event.user_id.to_string();
    info!(command = ?event.command, user_id, "received slash command");

    let app_state: Option<Arc<AppState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<AppState>>().cloned()
    };

    let reply = match app_state {
        None => {
            warn!("app state not available; cannot process command");
            "The merge service is starting up. Try again shortly.".to_owned()
        }
        Some(app) => {
            if let Err(err) = app.config.ensure_authorized(&user_id) {
                warn!(user_id, %err, "unauthorized slash command");
                "You are not allowed to use this bot.".to_owned()
            } else {
                let raw = event.text.unwrap_or_default();
                match parse_command(&raw) {
                    Ok(command) => execute(&app, &user_id, command).await,
                    Err(usage) => usage,
                }
            }
        }
    };

    Ok(SlackCommandEventResponse {
        content: SlackMessageContent::new().with_text(reply),
        response_type: Some(SlackMessageResponseType::Ephemeral),
    })
}
