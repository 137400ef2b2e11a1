//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::delivery::rclone_config;
use crate::{AppError, Result};

/// Keychain service name used for Slack credentials.
const KEYRING_SERVICE: &str = "merge-courier";

/// Nested Slack configuration for Socket Mode connectivity.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// never from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Slack user IDs allowed to drive the bot; empty means everyone.
    #[serde(default)]
    pub authorized_user_ids: Vec<String>,
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// File-system locations used by the pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PathConfig {
    /// Directory for downloaded uploads and per-merge scratch directories.
    pub work_dir: PathBuf,
    /// Per-user persisted state; holds `<user>/rclone.conf`.
    pub userdata_dir: PathBuf,
}

/// External tool binaries; bare names are resolved through `PATH`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolConfig {
    /// Media engine binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// Media inspection binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    /// Remote-storage transfer binary.
    #[serde(default = "default_rclone")]
    pub rclone: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            rclone: default_rclone(),
        }
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".into()
}

fn default_ffprobe() -> String {
    "ffprobe".into()
}

fn default_rclone() -> String {
    "rclone".into()
}

/// Admission and delivery limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LimitConfig {
    /// Maximum queued items per user.
    #[serde(default = "default_max_queue_items")]
    pub max_queue_items: usize,
    /// Largest artifact sent through the direct upload path.
    #[serde(default = "default_direct_upload_limit")]
    pub direct_upload_limit_bytes: u64,
    /// Merge outputs smaller than this are treated as corrupt.
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,
    /// Minimum interval between progress message edits.
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_queue_items: default_max_queue_items(),
            direct_upload_limit_bytes: default_direct_upload_limit(),
            min_output_bytes: default_min_output_bytes(),
            progress_throttle_ms: default_progress_throttle_ms(),
        }
    }
}

fn default_max_queue_items() -> usize {
    20
}

fn default_direct_upload_limit() -> u64 {
    50 * 1024 * 1024
}

fn default_min_output_bytes() -> u64 {
    1024
}

fn default_progress_throttle_ms() -> u64 {
    2000
}

/// Configurable timeout values (seconds) for external tool invocations.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Wall-clock ceiling for one merge invocation.
    #[serde(default = "default_merge_seconds")]
    pub merge_seconds: u64,
    /// Ceiling for each probe sub-query.
    #[serde(default = "default_probe_seconds")]
    pub probe_seconds: u64,
    /// Ceiling for preview-frame extraction.
    #[serde(default = "default_preview_seconds")]
    pub preview_seconds: u64,
    /// Ceiling for one remote-storage transfer.
    #[serde(default = "default_transfer_seconds")]
    pub transfer_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            merge_seconds: default_merge_seconds(),
            probe_seconds: default_probe_seconds(),
            preview_seconds: default_preview_seconds(),
            transfer_seconds: default_transfer_seconds(),
        }
    }
}

fn default_merge_seconds() -> u64 {
    3600
}

fn default_probe_seconds() -> u64 {
    10
}

fn default_preview_seconds() -> u64 {
    30
}

fn default_transfer_seconds() -> u64 {
    1800
}

impl TimeoutConfig {
    /// Merge timeout as a [`Duration`].
    #[must_use]
    pub fn merge(&self) -> Duration {
        Duration::from_secs(self.merge_seconds)
    }

    /// Probe timeout as a [`Duration`].
    #[must_use]
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_seconds)
    }

    /// Preview timeout as a [`Duration`].
    #[must_use]
    pub fn preview(&self) -> Duration {
        Duration::from_secs(self.preview_seconds)
    }

    /// Transfer timeout as a [`Duration`].
    #[must_use]
    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_seconds)
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Slack connectivity settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Working directories.
    pub paths: PathConfig,
    /// External tool binaries.
    #[serde(default)]
    pub tools: ToolConfig,
    /// Queue and delivery limits.
    #[serde(default)]
    pub limits: LimitConfig,
    /// External tool timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string, validate it, and create
    /// the working directories.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load Slack credentials from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// the required tokens.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        Ok(())
    }

    /// Path of the remote-storage configuration for one user.
    #[must_use]
    pub fn rclone_config_path(&self, user_id: &str) -> PathBuf {
        rclone_config::user_config_path(&self.paths.userdata_dir, user_id)
    }

    /// Progress throttle window as a [`Duration`].
    #[must_use]
    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.limits.progress_throttle_ms)
    }

    /// Validate that a Slack user may drive the bot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` if an allow-list is configured and
    /// the user is not on it.
    pub fn ensure_authorized(&self, user_id: &str) -> Result<()> {
        let allowed = &self.slack.authorized_user_ids;
        if allowed.is_empty() || allowed.iter().any(|id| id == user_id) {
            Ok(())
        } else {
            Err(AppError::Unauthorized("user is not authorized".into()))
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.limits.max_queue_items < 2 {
            return Err(AppError::Config(
                "max_queue_items must be at least 2".into(),
            ));
        }

        if self.limits.direct_upload_limit_bytes == 0 {
            return Err(AppError::Config(
                "direct_upload_limit_bytes must be greater than zero".into(),
            ));
        }

        if self.timeouts.merge_seconds == 0 || self.timeouts.transfer_seconds == 0 {
            return Err(AppError::Config(
                "merge and transfer timeouts must be greater than zero".into(),
            ));
        }

        for dir in [&self.paths.work_dir, &self.paths.userdata_dir] {
            fs::create_dir_all(dir).map_err(|err| {
                AppError::Config(format!("cannot create {}: {err}", dir.display()))
            })?;
        }

        self.paths.work_dir = self
            .paths
            .work_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("work_dir invalid: {err}")))?;
        self.paths.userdata_dir = self
            .paths
            .userdata_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("userdata_dir invalid: {err}")))?;

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
