//! External command execution with a wall-clock ceiling.
//!
//! [`run_captured`] buffers a short-lived command's output; [`run_observed`]
//! streams a long-running command's output line by line so progress can be
//! parsed while it runs.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::process::Command;
use tokio_util::codec::FramedRead;
use tracing::warn;

use crate::media::lines::ToolLineCodec;
use crate::{AppError, Result};

/// Output lines retained for diagnostics after a streamed run.
pub const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Captured standard output, decoded lossily.
    pub stdout: String,
    /// Captured standard error, decoded lossily.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
}

/// Run `program` with `args` to completion, capturing both output streams.
///
/// The child is killed if `limit` elapses first.
///
/// # Errors
///
/// Returns `AppError::Tool` if the process cannot be spawned or does not
/// finish within `limit`.
pub async fn run_captured<I, S>(program: &str, args: I, limit: Duration) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| AppError::Tool(format!("failed to spawn {program}: {err}")))?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| AppError::Tool(format!("{program} timed out after {}s", limit.as_secs())))?
        .map_err(|err| AppError::Tool(format!("{program} wait failed: {err}")))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    })
}

/// Exit state of a streamed command.
#[derive(Debug, Clone)]
pub struct ObservedExit {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Last [`DIAGNOSTIC_TAIL_LINES`] lines seen on either stream.
    pub tail: Vec<String>,
}

/// Run `program` to completion, handing every output line from stdout and
/// stderr to `on_line` as it arrives.
///
/// The child is killed if `limit` elapses first.
///
/// # Errors
///
/// Returns `AppError::Tool` if the process cannot be spawned, its output
/// pipes are unavailable, or it does not finish within `limit`.
pub async fn run_observed<I, S, F>(
    program: &str,
    args: I,
    limit: Duration,
    mut on_line: F,
) -> Result<ObservedExit>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    F: FnMut(&str) + Send,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| AppError::Tool(format!("failed to spawn {program}: {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Tool(format!("{program} stdout unavailable")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Tool(format!("{program} stderr unavailable")))?;

    let supervise = async move {
        let mut lines = stream::select(
            FramedRead::new(stdout, ToolLineCodec::new()),
            FramedRead::new(stderr, ToolLineCodec::new()),
        );
        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    on_line(&line);
                    if tail.len() == DIAGNOSTIC_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(err) => {
                    warn!(%err, "tool output read failed");
                    break;
                }
            }
        }
        (child.wait().await, tail)
    };

    // On timeout the supervising future is dropped with the child inside it.
    match tokio::time::timeout(limit, supervise).await {
        Ok((Ok(status), tail)) => Ok(ObservedExit {
            success: status.success(),
            tail: tail.into(),
        }),
        Ok((Err(err), _)) => Err(AppError::Tool(format!("{program} wait failed: {err}"))),
        Err(_) => Err(AppError::Tool(format!(
            "{program} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// Check whether `program` can be started at all.
pub async fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .is_ok()
}
