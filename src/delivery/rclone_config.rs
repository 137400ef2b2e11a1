//! Per-user remote-storage configuration.
//!
//! The file uses rclone's INI layout. Only the section headers matter
//! here: the first `[name]` section is the delivery target.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::delivery::DeliveryError;

/// File name of a user's configuration inside their userdata directory.
pub const CONFIG_FILE_NAME: &str = "rclone.conf";

/// Where the configuration for `user_id` lives under `userdata_dir`.
#[must_use]
pub fn user_config_path(userdata_dir: &Path, user_id: &str) -> PathBuf {
    userdata_dir.join(user_id).join(CONFIG_FILE_NAME)
}

/// Located and parsed remote-storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Configuration file, passed to the transfer tool as `--config`.
    pub path: PathBuf,
    /// Name of the first configured remote.
    pub remote: String,
}

/// Name of the first `[section]` in `text`, if any.
#[must_use]
pub fn first_remote(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_owned)
}

/// Read the configuration at `path`.
///
/// # Errors
///
/// Returns [`DeliveryError::ConfigurationMissing`] when the file does not
/// exist and [`DeliveryError::ConfigurationInvalid`] when it cannot be read
/// or names no remote.
pub async fn load(path: &Path) -> Result<RemoteConfig, DeliveryError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(DeliveryError::ConfigurationMissing {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(DeliveryError::ConfigurationInvalid(format!(
                "cannot read {}: {err}",
                path.display()
            )));
        }
    };

    let remote = first_remote(&text).ok_or_else(|| {
        DeliveryError::ConfigurationInvalid("no [remote] section found".into())
    })?;

    Ok(RemoteConfig {
        path: path.to_path_buf(),
        remote,
    })
}
