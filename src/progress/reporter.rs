//! Throttled progress rendering.
//!
//! Tools report progress many times per second; the chat service tolerates
//! roughly one edit every couple of seconds per message. The reporter drops
//! every observation that arrives inside the throttle window and renders the
//! rest as a status block with a fixed-width bar, elapsed wall time, and ETA.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::messaging::{MessageHandle, Messenger};
use crate::models::progress::ProgressSample;

/// Number of cells in the rendered progress bar.
pub const BAR_WIDTH: usize = 20;

const FILLED: char = '\u{2588}';
const EMPTY: char = '\u{2591}';

/// Rate-limits progress samples into status text.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    throttle: Duration,
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    /// Create a reporter whose elapsed clock starts now.
    #[must_use]
    pub fn new(label: impl Into<String>, throttle: Duration) -> Self {
        Self::starting_at(label, throttle, Instant::now())
    }

    /// Create a reporter whose elapsed clock starts at `started`.
    #[must_use]
    pub fn starting_at(label: impl Into<String>, throttle: Duration, started: Instant) -> Self {
        Self {
            label: label.into(),
            throttle,
            started,
            last_emit: None,
        }
    }

    /// Offer one sample observed at `now`.
    ///
    /// Returns rendered status text when the throttle window has passed
    /// since the last emitted update, otherwise `None`.
    pub fn observe(&mut self, now: Instant, sample: &ProgressSample) -> Option<String> {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.throttle {
                return None;
            }
        }
        self.last_emit = Some(now);
        Some(render_status(
            &self.label,
            sample,
            now.saturating_duration_since(self.started),
        ))
    }

    /// Drain `samples`, editing `handle` with each update that passes the
    /// throttle. Edit failures are logged and otherwise ignored.
    pub async fn pump(
        mut self,
        mut samples: mpsc::Receiver<ProgressSample>,
        messenger: &dyn Messenger,
        handle: &MessageHandle,
    ) {
        while let Some(sample) = samples.recv().await {
            let Some(text) = self.observe(Instant::now(), &sample) else {
                continue;
            };
            if let Err(err) = messenger.edit(handle, &text).await {
                debug!(%err, "progress edit dropped");
            }
        }
    }
}

/// Render a full status block for `sample`.
#[must_use]
pub fn render_status(label: &str, sample: &ProgressSample, elapsed: Duration) -> String {
    let percent = sample.percent();
    let eta = sample.eta_secs().map_or_else(
        || "calculating\u{2026}".to_owned(),
        |secs| format_elapsed(seconds(secs)),
    );
    format!(
        "{label}\n[{bar}] {percent:.1}%\nElapsed: {elapsed}\nETA: {eta}",
        bar = render_bar(percent),
        elapsed = format_elapsed(elapsed.as_secs()),
    )
}

/// Render a [`BAR_WIDTH`]-cell bar for a percentage in `0..=100`.
#[must_use]
pub fn render_bar(percent: f64) -> String {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64) as usize;
    let filled = filled.min(BAR_WIDTH);
    let mut bar = String::with_capacity(BAR_WIDTH * 3);
    bar.extend(std::iter::repeat_n(FILLED, filled));
    bar.extend(std::iter::repeat_n(EMPTY, BAR_WIDTH - filled));
    bar
}

/// Format a wall-clock span as `Xs`, `Xm Ys`, or `Xh Ym`.
#[must_use]
pub fn format_elapsed(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
