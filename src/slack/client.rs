//! Slack Socket Mode client and Web API adapter.
//!
//! [`SlackService`] implements the [`Messenger`] and [`ArtifactUploader`]
//! seams on top of `slack-morphism`. Users are addressed through their
//! direct-message conversation, opened once and cached.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatDeleteRequest, SlackApiChatPostMessageRequest, SlackApiChatUpdateRequest,
    SlackApiConversationsOpenRequest, SlackApiFilesComplete,
    SlackApiFilesCompleteUploadExternalRequest, SlackApiFilesGetUploadUrlExternalRequest,
    SlackApiToken, SlackApiTokenType, SlackApiTokenValue, SlackChannelId, SlackClient,
    SlackClientEventsListenerEnvironment, SlackClientHyperHttpsConnector, SlackClientSession,
    SlackClientSocketModeConfig, SlackClientSocketModeListener, SlackFileId, SlackMessageContent,
    SlackSocketModeListenerCallbacks, SlackTs, SlackUserId,
};
use tokio::sync::Mutex;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::messaging::{Artifact, ArtifactUploader, MessageHandle, Messenger};
use crate::models::settings::UploadFormat;
use crate::slack::{commands, events, AppState};
use crate::{config::SlackConfig, AppError, Result};

const MAX_POST_ATTEMPTS: u32 = 5;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How an upload body is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadBody {
    /// Read the whole file into memory.
    Buffered,
    /// Stream the file from disk.
    Streamed,
}

/// Slack Web API and Socket Mode wrapper.
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    app_token: SlackApiToken,
    http: reqwest::Client,
    dm_channels: Mutex<HashMap<String, SlackChannelId>>,
}

impl SlackService {
    /// Create the Slack client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig, http: reqwest::Client) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.app_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };

        Ok(Self {
            client,
            bot_token,
            app_token,
            http,
            dm_channels: Mutex::new(HashMap::new()),
        })
    }

    /// Start the Socket Mode listener with `state` available to handlers.
    pub fn start_socket_mode(&self, state: Arc<AppState>) -> JoinHandle<()> {
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.client))
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(state),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                info!(?event, "socket hello");
            })
            .with_command_events(commands::handle_command)
            .with_push_events(events::handle_push_event);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        let app_token = self.app_token.clone();
        info!("slack socket mode starting");
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }

    /// Create an HTTP session for direct API calls using the bot token.
    #[must_use]
    pub fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }

    async fn dm_channel(&self, user_id: &str) -> Result<SlackChannelId> {
        if let Some(channel) = self.dm_channels.lock().await.get(user_id) {
            return Ok(channel.clone());
        }

        let request = SlackApiConversationsOpenRequest::new()
            .with_users(vec![SlackUserId(user_id.to_owned())]);
        let channel = self
            .http_session()
            .conversations_open(&request)
            .await
            .map_err(|err| AppError::Slack(format!("failed to open dm: {err}")))?
            .channel
            .id;

        self.dm_channels
            .lock()
            .await
            .insert(user_id.to_owned(), channel.clone());
        Ok(channel)
    }

    async fn post_text(&self, channel: SlackChannelId, text: &str) -> Result<SlackTs> {
        let request = SlackApiChatPostMessageRequest::new(
            channel,
            SlackMessageContent::new().with_text(text.to_owned()),
        );
        let session = self.http_session();
        let mut backoff = INITIAL_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match session.chat_post_message(&request).await {
                Ok(response) => return Ok(response.ts),
                Err(error) if attempt < MAX_POST_ATTEMPTS => {
                    let delay = match &error {
                        SlackClientError::RateLimitError(rate) => rate.retry_after.unwrap_or(backoff),
                        _ => backoff,
                    };
                    warn!(?error, delay = ?delay, attempt, "slack post failed; retrying");
                    sleep(delay).await;
                    backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
                Err(error) => {
                    return Err(AppError::Slack(format!("failed to post message: {error}")));
                }
            }
        }
    }

    async fn update_text(&self, handle: MessageHandle, text: String) -> Result<()> {
        let request = SlackApiChatUpdateRequest::new(
            SlackChannelId(handle.channel),
            SlackMessageContent::new().with_text(text),
            SlackTs(handle.ts),
        );
        match self.http_session().chat_update(&request).await {
            Ok(_) => Ok(()),
            Err(SlackClientError::ApiError(api)) if api.code == "message_not_found" => {
                Err(AppError::NotFound("message no longer exists".into()))
            }
            Err(err) => Err(AppError::Slack(format!("failed to update message: {err}"))),
        }
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<()> {
        let request =
            SlackApiChatDeleteRequest::new(SlackChannelId(handle.channel), SlackTs(handle.ts));
        self.http_session()
            .chat_delete(&request)
            .await
            .map_err(|err| AppError::Slack(format!("failed to delete message: {err}")))?;
        Ok(())
    }

    /// Upload an artifact (and, for video format, its preview frame) to the
    /// user's DM using the external upload flow.
    async fn upload_artifact(&self, user_id: &str, artifact: Artifact, body: UploadBody) -> Result<()> {
        let channel = self.dm_channel(user_id).await?;

        let mut files = vec![SlackApiFilesComplete {
            id: self
                .put_file(&artifact.name, &artifact.path, artifact.size_bytes, body)
                .await?,
            title: Some(artifact.name.clone()),
        }];

        if let (UploadFormat::Video, Some(preview)) = (artifact.format, &artifact.preview) {
            match tokio::fs::metadata(preview).await {
                Ok(meta) => {
                    let id = self
                        .put_file("preview.jpg", preview, meta.len(), UploadBody::Buffered)
                        .await?;
                    files.push(SlackApiFilesComplete {
                        id,
                        title: Some(format!("{} preview", artifact.name)),
                    });
                }
                Err(err) => warn!(%err, "preview frame vanished before upload"),
            }
        }

        let mut complete_request = SlackApiFilesCompleteUploadExternalRequest::new(files);
        complete_request.channel_id = Some(channel);
        complete_request.initial_comment = Some(artifact.caption.clone());
        self.http_session()
            .files_complete_upload_external(&complete_request)
            .await
            .map_err(|err| AppError::Slack(format!("failed to complete upload: {err}")))?;

        info!(user_id, name = %artifact.name, bytes = artifact.size_bytes, ?body, "artifact uploaded");
        Ok(())
    }

    /// Steps 1 and 2 of the external upload flow: reserve a URL, then send
    /// the bytes to it.
    async fn put_file(
        &self,
        name: &str,
        path: &std::path::Path,
        size_bytes: u64,
        body: UploadBody,
    ) -> Result<SlackFileId> {
        let length = usize::try_from(size_bytes)
            .map_err(|_| AppError::Slack(format!("{name} is too large to upload")))?;
        let url_request = SlackApiFilesGetUploadUrlExternalRequest::new(name.into(), length);
        let url_response = self
            .http_session()
            .get_upload_url_external(&url_request)
            .await
            .map_err(|err| AppError::Slack(format!("failed to get upload url: {err}")))?;

        let payload = match body {
            UploadBody::Buffered => reqwest::Body::from(tokio::fs::read(path).await?),
            UploadBody::Streamed => {
                let file = tokio::fs::File::open(path).await?;
                reqwest::Body::wrap_stream(ReaderStream::new(file))
            }
        };

        self.http
            .post(url_response.upload_url.0.to_string())
            .body(payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| AppError::Slack(format!("failed to upload file: {err}")))?;

        Ok(url_response.file_id)
    }
}

impl Messenger for SlackService {
    fn notify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageHandle>> + Send + '_>> {
        let user_id = user_id.to_owned();
        let text = text.to_owned();
        Box::pin(async move {
            let channel = self.dm_channel(&user_id).await?;
            let ts = self.post_text(channel.clone(), &text).await?;
            Ok(MessageHandle {
                channel: channel.to_string(),
                ts: ts.to_string(),
            })
        })
    }

    fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.update_text(handle.clone(), text.to_owned()))
    }

    fn delete(
        &self,
        handle: &MessageHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.delete_message(handle.clone()))
    }
}

impl ArtifactUploader for SlackService {
    fn upload_inline(
        &self,
        user_id: &str,
        artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let user_id = user_id.to_owned();
        Box::pin(async move {
            self.upload_artifact(&user_id, artifact, UploadBody::Buffered)
                .await
        })
    }

    fn upload_streamed(
        &self,
        user_id: &str,
        artifact: Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let user_id = user_id.to_owned();
        Box::pin(async move {
            self.upload_artifact(&user_id, artifact, UploadBody::Streamed)
                .await
        })
    }
}
