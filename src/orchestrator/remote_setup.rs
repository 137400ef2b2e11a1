//! Remote-storage setup from a shared `rclone.conf`.
//!
//! A user enables the remote-storage destination by sharing their rclone
//! configuration in the DM. The file must name at least one `[remote]`
//! section; it is then stored at the user's configuration path and the
//! user's destination switches to remote storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::delivery::rclone_config::{self, RemoteConfig};
use crate::delivery::DeliveryError;
use crate::messaging::Messenger;
use crate::models::settings::Destination;
use crate::orchestrator::Upload;
use crate::queue::QueueRegistry;
use crate::slack::text;
use crate::{AppError, Result};

/// Whether a shared file should be treated as a remote-storage config.
#[must_use]
pub fn is_remote_config(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("conf"))
}

/// Result of [`RemoteSetup::accept`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSetupOutcome {
    /// The configuration was stored.
    Installed(RemoteConfig),
    /// The file was refused; nothing was stored.
    Rejected(DeliveryError),
}

/// Installs per-user remote-storage configurations.
pub struct RemoteSetup {
    userdata_dir: PathBuf,
    registry: Arc<QueueRegistry>,
    messenger: Arc<dyn Messenger>,
}

impl RemoteSetup {
    /// Create the setup service storing configurations under `userdata_dir`.
    #[must_use]
    pub fn new(
        userdata_dir: impl Into<PathBuf>,
        registry: Arc<QueueRegistry>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            userdata_dir: userdata_dir.into(),
            registry,
            messenger,
        }
    }

    /// Validate and store the configuration in `upload`.
    ///
    /// The received file is always deleted. A previously stored
    /// configuration is only replaced by a valid one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if a valid configuration cannot be written.
    pub async fn accept(&self, upload: Upload) -> Result<RemoteSetupOutcome> {
        let parsed = read_config(&upload.path).await;
        discard(&upload.path).await;

        let contents = match parsed {
            Ok(contents) => contents,
            Err(err) => {
                warn!(user_id = %upload.user_id, %err, "remote configuration refused");
                let reason = match &err {
                    DeliveryError::ConfigurationInvalid(reason) => reason.clone(),
                    other => other.to_string(),
                };
                self.tell(&upload.user_id, &text::remote_config_rejected(&reason))
                    .await;
                return Ok(RemoteSetupOutcome::Rejected(err));
            }
        };

        let path = rclone_config::user_config_path(&self.userdata_dir, &upload.user_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                AppError::Io(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        tokio::fs::write(&path, contents.as_bytes())
            .await
            .map_err(|err| AppError::Io(format!("failed to write {}: {err}", path.display())))?;
        let config = rclone_config::load(&path)
            .await
            .map_err(|err| AppError::Io(err.to_string()))?;
        info!(user_id = %upload.user_id, remote = %config.remote, "remote storage configured");

        let queue = self.registry.get_or_create(&upload.user_id).await;
        let switched = match queue
            .update_settings(|s| s.destination = Destination::RemoteStorage)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                debug!(user_id = %upload.user_id, %err, "destination left unchanged");
                false
            }
        };
        self.tell(&upload.user_id, &text::remote_configured(&config.remote, switched))
            .await;
        Ok(RemoteSetupOutcome::Installed(config))
    }

    async fn tell(&self, user_id: &str, body: &str) {
        if let Err(err) = self.messenger.notify(user_id, body).await {
            warn!(user_id, %err, "failed to notify user");
        }
    }
}

async fn read_config(path: &Path) -> std::result::Result<String, DeliveryError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
        DeliveryError::ConfigurationInvalid(format!("the file could not be read ({err})"))
    })?;
    if rclone_config::first_remote(&contents).is_none() {
        return Err(DeliveryError::ConfigurationInvalid(
            "no [remote] section found".into(),
        ));
    }
    Ok(contents)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => debug!(path = %path.display(), %err, "failed to delete received config"),
    }
}
