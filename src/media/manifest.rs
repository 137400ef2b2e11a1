//! Concatenation manifest for the media engine.
//!
//! One `file '<absolute-path>'` line per input, in merge order. Single
//! quotes inside a path are closed, escaped, and reopened (`'\''`), and
//! backslashes are normalised to forward slashes.

use std::path::{Path, PathBuf};

use crate::{AppError, Result};

/// Render the manifest body for `inputs`.
///
/// # Errors
///
/// Returns `AppError::Io` if a relative path cannot be made absolute.
pub fn render(inputs: &[PathBuf]) -> Result<String> {
    let mut body = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input)
            .map_err(|err| AppError::Io(format!("cannot resolve {}: {err}", input.display())))?;
        let normalized = absolute.to_string_lossy().replace('\\', "/");
        body.push_str("file '");
        body.push_str(&normalized.replace('\'', r"'\''"));
        body.push_str("'\n");
    }
    Ok(body)
}

/// Write the manifest for `inputs` to `path`.
///
/// # Errors
///
/// Returns `AppError::Io` if rendering or writing fails.
pub async fn write(path: &Path, inputs: &[PathBuf]) -> Result<()> {
    let body = render(inputs)?;
    tokio::fs::write(path, body)
        .await
        .map_err(|err| AppError::Io(format!("failed to write manifest: {err}")))
}
