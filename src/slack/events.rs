//! Slack push-event handler: file shares in direct messages.
//!
//! Every file attached to a user's DM message is downloaded into
//! `work_dir`. A `.conf` file goes to
//! [`RemoteSetup`](crate::orchestrator::RemoteSetup); anything else goes to
//! [`Intake`](crate::orchestrator::Intake). Each download runs on its own
//! task so the Socket Mode acknowledgement is not held up by large
//! transfers.

use std::path::PathBuf;
use std::sync::Arc;

use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector, SlackEventCallbackBody,
    SlackMessageEvent, SlackPushEventCallback,
};
use tracing::{debug, error, info, warn};

use crate::orchestrator::remote_setup::is_remote_config;
use crate::orchestrator::{IntakeOutcome, RemoteSetupOutcome, Upload};
use crate::slack::{files, AppState};

/// One file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    /// Slack file identifier.
    pub id: String,
    /// Name given by the sender.
    pub name: String,
    /// Authenticated download URL.
    pub url: String,
}

/// Files attached to a user-authored message, with the sender and message
/// timestamp. `None` for bot messages and messages without files.
#[must_use]
pub fn shared_files(event: &SlackMessageEvent) -> Option<(String, String, Vec<SharedFile>)> {
    if event.sender.bot_id.is_some() {
        return None;
    }
    let user_id = event.sender.user.as_ref()?.to_string();
    let files: Vec<SharedFile> = event
        .content
        .as_ref()?
        .files
        .as_ref()?
        .iter()
        .filter_map(|file| {
            Some(SharedFile {
                id: file.id.to_string(),
                name: file.name.clone()?,
                url: file.url_private_download.as_ref()?.to_string(),
            })
        })
        .collect();
    if files.is_empty() {
        return None;
    }
    Some((user_id, event.origin.ts.to_string(), files))
}

/// Handle push events delivered via Socket Mode.
///
/// # Errors
///
/// Never fails; problems are logged.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let SlackEventCallbackBody::Message(message) = event.event else {
        debug!("push event ignored");
        return Ok(());
    };
    let Some((user_id, message_ts, shared)) = shared_files(&message) else {
        return Ok(());
    };

    let app_state: Option<Arc<AppState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<AppState>>().cloned()
    };
    let Some(app) = app_state else {
        warn!("app state not available; dropping file share");
        return Ok(());
    };

    if let Err(err) = app.config.ensure_authorized(&user_id) {
        warn!(user_id, %err, "file share from unauthorized user ignored");
        return Ok(());
    }

    for file in shared {
        let app = Arc::clone(&app);
        let user_id = user_id.clone();
        let message_ts = message_ts.clone();
        tokio::spawn(async move {
            receive(&app, user_id, message_ts, file).await;
        });
    }
    Ok(())
}

async fn receive(app: &AppState, user_id: String, message_ts: String, file: SharedFile) {
    let target: PathBuf = app
        .config
        .paths
        .work_dir
        .join(format!("{}-{}", uuid::Uuid::new_v4(), files::safe_file_name(&file.name)));

    let declared_size = match files::download(&app.http, &app.config.slack.bot_token, &file.url, &target).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(user_id, file_id = %file.id, message_ts, %err, "file download failed");
            if let Err(err) = tokio::fs::remove_file(&target).await {
                debug!(path = %target.display(), %err, "no partial download to remove");
            }
            if let Err(err) = app
                .messenger
                .notify(&user_id, &format!("\u{274c} Could not download {}.", file.name))
                .await
            {
                warn!(user_id, %err, "failed to report download failure");
            }
            return;
        }
    };

    let upload = Upload {
        user_id: user_id.clone(),
        path: target,
        display_name: file.name.clone(),
        declared_size,
        // Re-sharing the same Slack file reuses its id, so it is detected
        // as a duplicate.
        submission_ref: file.id.clone(),
    };
    if is_remote_config(&file.name) {
        match app.remote_setup.accept(upload).await {
            Ok(RemoteSetupOutcome::Installed(config)) => {
                info!(user_id, remote = %config.remote, "remote configuration installed");
            }
            Ok(RemoteSetupOutcome::Rejected(err)) => debug!(user_id, %err, "remote configuration refused"),
            Err(err) => error!(user_id, %err, "remote configuration setup failed"),
        }
        return;
    }

    match app.intake.accept(upload).await {
        Ok(IntakeOutcome::Queued { position }) => {
            info!(user_id, name = %file.name, position, "upload queued");
        }
        Ok(outcome) => debug!(user_id, ?outcome, "upload not queued"),
        Err(err) => error!(user_id, %err, "upload intake failed"),
    }
}
