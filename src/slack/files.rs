//! File transfer helpers for the Slack HTTP endpoints.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::{AppError, Result};

/// Strip path components and control characters from a sender-chosen
/// file name.
#[must_use]
pub fn safe_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_owned();
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned
    }
}

/// Stream `url` to `target` using the bot token; returns bytes written.
///
/// # Errors
///
/// Returns `AppError::Slack` on HTTP failure and `AppError::Io` on write
/// failure.
pub async fn download(
    http: &reqwest::Client,
    bot_token: &str,
    url: &str,
    target: &Path,
) -> Result<u64> {
    let response = http
        .get(url)
        .bearer_auth(bot_token)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| AppError::Slack(format!("file download failed: {err}")))?;

    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|err| AppError::Io(format!("cannot create {}: {err}", target.display())))?;
    let mut written: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| AppError::Slack(format!("file download interrupted: {err}")))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
