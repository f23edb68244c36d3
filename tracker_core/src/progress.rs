//! Advisory progress reporting.

use tracing::debug;

/// Receives progress updates from a running tracker.
///
/// Called from stage-1 worker threads, so implementations must be cheap and
/// must not block.
pub trait ProgressListener: Send + Sync {
    /// Fraction of the run done, in `[0, 1]`.
    fn set_progress(&self, fraction: f64);

    fn set_status(&self, status: &str);
}

/// Default listener: debug-level log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressListener for TracingProgress {
    fn set_progress(&self, fraction: f64) {
        debug!(percent = fraction * 100.0, "tracking progress");
    }

    fn set_status(&self, status: &str) {
        debug!(status, "tracking status");
    }
}

/// Listener that drops every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgress;

impl ProgressListener for SilentProgress {
    fn set_progress(&self, _fraction: f64) {}

    fn set_status(&self, _status: &str) {}
}
