//! Observability seam for tracked calls.
//!
//! The tracker never logs through globals; it reports to the observer held by its
//! configuration. [`TracingObserver`] is the default and forwards everything to `tracing`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::time::Duration;

use memtrail_core::{Error, Sample};
use tracing::{debug, error, info, warn};

use crate::tracker::TrackerPhase;

/// Receives lifecycle events from trackers and their samplers.
///
/// Every method has a no-op default. `on_sample` and `on_callback_error` run on the
/// sampler thread; everything else runs on the thread that called the tracker.
pub trait TrackerObserver: Send + Sync {
    /// A tracked call moved to a new phase
    fn on_phase(&self, _phase: TrackerPhase) {}

    /// A sample was appended to the series
    fn on_sample(&self, _sample: &Sample) {}

    /// The user callback returned an error or panicked; sampling continues
    fn on_callback_error(&self, _sample: &Sample, _reason: &str) {}

    /// The sampler stopped because the footprint could not be read
    fn on_sampler_failure(&self, _reason: &str) {}

    /// The sampler did not stop within the grace period
    fn on_join_timeout(&self, _grace: Duration) {}

    /// The unit of work returned an error or panicked
    fn on_work_failure(&self, _reason: &str) {}

    /// The live-object census failed and was replaced by an empty result
    fn on_census_failure(&self, _reason: &str) {}

    /// A series was written to an export sink
    fn on_export(&self, _sink: &str, _path: &Path) {}

    /// An export sink failed; remaining sinks still run
    fn on_export_failure(&self, _sink: &str, _path: &Path, _error: &Error) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrackerObserver for NoopObserver {}

/// Observer that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TrackerObserver for TracingObserver {
    fn on_phase(&self, phase: TrackerPhase) {
        debug!(phase = ?phase, "Tracked call phase changed");
    }

    fn on_sample(&self, sample: &Sample) {
        debug!(
            "[memtrail] {:.1}s -> {:.2} MB",
            sample.timestamp(),
            sample.footprint_mb()
        );
    }

    fn on_callback_error(&self, sample: &Sample, reason: &str) {
        warn!(timestamp = sample.timestamp(), "Callback error: {reason}");
    }

    fn on_sampler_failure(&self, reason: &str) {
        error!("Monitor thread error: {reason}");
    }

    fn on_join_timeout(&self, grace: Duration) {
        warn!(grace = ?grace, "Monitor thread did not terminate cleanly");
    }

    fn on_work_failure(&self, reason: &str) {
        error!("Tracked function failed: {reason}");
    }

    fn on_census_failure(&self, reason: &str) {
        warn!("Live object census failed: {reason}");
    }

    fn on_export(&self, sink: &str, path: &Path) {
        info!(sink, path = %path.display(), "Memory data exported");
    }

    fn on_export_failure(&self, sink: &str, path: &Path, error: &Error) {
        error!(sink, path = %path.display(), error = %error, "Failed to export memory data");
    }
}
