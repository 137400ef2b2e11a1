//! Remote-storage delivery through the `rclone` CLI.
//!
//! The configuration is checked before anything is spawned, so a user
//! without a configured remote gets an immediate `ConfigurationMissing`.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, info_span, Instrument};

use crate::delivery::rclone_config::{self, RemoteConfig};
use crate::delivery::{Delivered, DeliveryError, DeliveryRequest, DeliveryTarget, TransportStrategy};
use crate::media::command::{is_available, run_observed};
use crate::messaging::Messenger;
use crate::models::settings::Destination;
use crate::progress::parser::parse_transfer_line;
use crate::progress::reporter::ProgressReporter;

const PROGRESS_BUFFER: usize = 32;

/// Copies artifacts to the first remote in the user's rclone config.
pub struct RemoteStorageUpload {
    program: String,
    userdata_dir: PathBuf,
    timeout: Duration,
    throttle: Duration,
    messenger: Arc<dyn Messenger>,
}

impl RemoteStorageUpload {
    /// Create the strategy.
    ///
    /// Per-user configuration is read from
    /// `<userdata_dir>/<user>/rclone.conf`.
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        userdata_dir: impl Into<PathBuf>,
        timeout: Duration,
        throttle: Duration,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            program: program.into(),
            userdata_dir: userdata_dir.into(),
            timeout,
            throttle,
            messenger,
        }
    }

    fn config_path(&self, user_id: &str) -> PathBuf {
        rclone_config::user_config_path(&self.userdata_dir, user_id)
    }

    async fn transfer(
        &self,
        request: &DeliveryRequest,
        config: &RemoteConfig,
    ) -> Result<(), DeliveryError> {
        let failed = |reason: String| DeliveryError::TransferFailed {
            target: DeliveryTarget::RemoteStorage,
            reason,
        };

        if !is_available(&self.program).await {
            return Err(failed(format!("{} is not installed", self.program)));
        }

        let args = copy_args(config, &request.artifact.path);
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);

        let run = async move {
            run_observed(&self.program, args, self.timeout, |line| {
                if let Some(sample) = parse_transfer_line(line) {
                    // A full channel only means the reporter is behind.
                    let _ = tx.try_send(sample);
                }
            })
            .await
        };
        let report = async {
            let reporter = ProgressReporter::new(
                format!("Uploading to {}", config.remote),
                self.throttle,
            );
            match &request.status {
                Some(handle) => reporter.pump(rx, self.messenger.as_ref(), handle).await,
                None => drop(rx),
            }
        };

        let (exit, ()) = tokio::join!(run, report);
        let exit = exit.map_err(|err| failed(err.to_string()))?;
        if exit.success {
            Ok(())
        } else {
            error!(tail = ?exit.tail, "remote transfer exited with failure");
            Err(failed("transfer tool exited with failure".into()))
        }
    }
}

impl TransportStrategy for RemoteStorageUpload {
    fn target(&self) -> DeliveryTarget {
        DeliveryTarget::RemoteStorage
    }

    fn applies(&self, request: &DeliveryRequest) -> bool {
        request.destination == Destination::RemoteStorage
    }

    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Delivered, DeliveryError>> + Send + 'a>> {
        let span = info_span!("remote_storage", user_id = %request.user_id);
        Box::pin(
            async move {
                let config = rclone_config::load(&self.config_path(&request.user_id)).await?;
                info!(
                    remote = %config.remote,
                    bytes = request.size_bytes(),
                    "starting remote transfer"
                );
                self.transfer(request, &config).await?;
                info!(remote = %config.remote, "remote transfer complete");
                Ok(Delivered {
                    target: DeliveryTarget::RemoteStorage,
                    remote: Some(config.remote),
                })
            }
            .instrument(span),
        )
    }
}

/// Arguments copying `artifact` to the root of the configured remote with
/// periodic stats output.
#[must_use]
pub fn copy_args(config: &RemoteConfig, artifact: &Path) -> Vec<OsString> {
    let mut conf_flag = OsString::from("--config=");
    conf_flag.push(config.path.as_os_str());
    vec![
        OsString::from("copy"),
        conf_flag,
        artifact.as_os_str().to_owned(),
        OsString::from(format!("{}:/", config.remote)),
        OsString::from("-P"),
        OsString::from("--stats=2s"),
    ]
}
