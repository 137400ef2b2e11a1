//! Progress observations parsed from external tool output.

/// One progress observation from a long-running tool.
///
/// Units are tool-specific (media seconds for the merge engine, bytes for
/// remote transfers); only the ratios matter to the reporter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Units processed so far.
    pub elapsed: f64,
    /// Total units expected; `0.0` when unknown.
    pub total: f64,
    /// Instantaneous throughput in units per wall-clock second.
    pub rate: Option<f64>,
}

impl ProgressSample {
    /// Completion percentage in `0.0..=100.0`; zero when the total is unknown.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total > 0.0 {
            (self.elapsed / self.total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Estimated seconds remaining, when throughput is known and positive.
    #[must_use]
    pub fn eta_secs(&self) -> Option<f64> {
        let rate = self.rate.filter(|r| r.is_finite() && *r > 0.0)?;
        if self.total <= 0.0 {
            return None;
        }
        Some(((self.total - self.elapsed).max(0.0)) / rate)
    }
}
