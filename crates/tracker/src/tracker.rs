#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Scoped tracked calls

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use memtrail_core::Series;
use thiserror::Error;

use crate::census::Census;
use crate::config::TrackerConfig;
use crate::sampler::{Sampler, panic_message};

/// Lifecycle of one tracked call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerPhase {
    /// Configuration accepted, sampler starting
    Configuring,
    /// Sampler running alongside the work
    Running,
    /// Work finished, sampler being stopped
    Stopping,
    /// Result assembled
    Done,
    /// The work or the tracker failed
    Failed,
}

/// Value of a successful tracked call along with its memory trace
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedResult<T> {
    value: T,
    memory_usage: Series,
    live_objects: Option<Census>,
}

impl<T> TrackedResult<T> {
    /// Value returned by the work
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Samples taken while the work ran
    #[must_use]
    pub const fn memory_usage(&self) -> &Series {
        &self.memory_usage
    }

    /// Census taken after the work, if requested
    #[must_use]
    pub const fn live_objects(&self) -> Option<&Census> {
        self.live_objects.as_ref()
    }

    /// Take the work's value, dropping the trace
    pub fn into_value(self) -> T {
        self.value
    }

    /// Split into value, series and census
    pub fn into_parts(self) -> (T, Series, Option<Census>) {
        (self.value, self.memory_usage, self.live_objects)
    }
}

/// Failure of a tracked call; both variants keep the samples taken so far
#[derive(Debug, Error)]
pub enum TrackError<E> {
    /// The work itself failed
    #[error("tracked work failed: {source}")]
    Work {
        /// Error returned by the work
        source: E,
        /// Samples taken before the failure
        memory_usage: Series,
    },

    /// The work succeeded but tracking did not
    #[error("memory tracking failed: {reason}")]
    Tracking {
        /// What went wrong in the tracker
        reason: String,
        /// Samples taken before the failure
        memory_usage: Series,
    },
}

impl<E> TrackError<E> {
    /// Samples taken before the failure
    #[must_use]
    pub const fn memory_usage(&self) -> &Series {
        match self {
            Self::Work { memory_usage, .. } | Self::Tracking { memory_usage, .. } => memory_usage,
        }
    }

    /// Error returned by the work, if that is what failed
    #[must_use]
    pub const fn work_error(&self) -> Option<&E> {
        match self {
            Self::Work { source, .. } => Some(source),
            Self::Tracking { .. } => None,
        }
    }

    /// Check if the work itself failed
    #[must_use]
    pub const fn is_work(&self) -> bool {
        matches!(self, Self::Work { .. })
    }
}

/// Everything a finished session hands back to its entry point
pub(crate) struct SessionOutcome<T, E> {
    /// The work's result, or its panic payload
    pub(crate) work: Result<Result<T, E>, Box<dyn Any + Send>>,
    pub(crate) series: Series,
    pub(crate) tracking_failure: Option<String>,
}

/// Run `work` with a sampler alongside it, then stop and join the sampler.
///
/// The sampler is always stopped, even if the work panics; the payload is handed
/// back for the caller to resume. Only a sampler that cannot start prevents the
/// work from running.
pub(crate) fn run_session<T, E, F>(
    config: &TrackerConfig,
    work: F,
) -> Result<SessionOutcome<T, E>, TrackError<E>>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let observer = config.observer();
    observer.on_phase(TrackerPhase::Configuring);

    let handle = Sampler::from_config(config).spawn().map_err(|e| {
        observer.on_phase(TrackerPhase::Failed);
        TrackError::Tracking {
            reason: e.to_string(),
            memory_usage: Series::new(),
        }
    })?;

    observer.on_phase(TrackerPhase::Running);
    let outcome = panic::catch_unwind(AssertUnwindSafe(work));

    observer.on_phase(TrackerPhase::Stopping);
    let report = handle.stop_and_join(config.join_grace());

    match &outcome {
        Ok(Err(e)) => observer.on_work_failure(&e.to_string()),
        Err(payload) => observer.on_work_failure(&format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        )),
        Ok(Ok(_)) => {}
    }

    Ok(SessionOutcome {
        work: outcome,
        series: report.series,
        tracking_failure: report.exit.failure(),
    })
}

/// Census of the configured source; failures degrade to an empty map
fn take_census(config: &TrackerConfig) -> Census {
    let observer = config.observer();
    let source = config.census_source();
    let min_size_kb = config.census_min_size_kb();

    match panic::catch_unwind(AssertUnwindSafe(|| source.census(min_size_kb))) {
        Ok(Ok(census)) => census,
        Ok(Err(e)) => {
            observer.on_census_failure(&e.to_string());
            Census::new()
        }
        Err(payload) => {
            observer.on_census_failure(&panic_message(payload.as_ref()));
            Census::new()
        }
    }
}

/// Tracks the memory footprint of individual calls and hands the trace back
#[derive(Debug, Clone)]
pub struct MemoryTracker {
    config: TrackerConfig,
}

impl MemoryTracker {
    /// Create a tracker for an already-validated configuration
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run `work` while sampling the process footprint.
    ///
    /// A failure of the work wins over a failure of the tracker. A panic in the
    /// work is resumed after the sampler has been stopped.
    ///
    /// # Errors
    ///
    /// - `TrackError::Work` if the work returns an error
    /// - `TrackError::Tracking` if the work succeeded but the footprint could not be sampled
    ///
    /// # Examples
    ///
    /// ```
    /// # use memtrail_tracker::{MemoryTracker, TrackerConfig, NoopObserver};
    /// # use std::sync::Arc;
    /// let config = TrackerConfig::builder()
    ///     .interval_secs(0.05)
    ///     .observer(Arc::new(NoopObserver))
    ///     .build()
    ///     .unwrap();
    ///
    /// let tracked = MemoryTracker::new(config)
    ///     .track(|| Ok::<_, std::io::Error>(vec![0_u8; 1024].len()))
    ///     .unwrap();
    ///
    /// assert_eq!(*tracked.value(), 1024);
    /// assert!(!tracked.memory_usage().is_empty());
    /// ```
    pub fn track<T, E, F>(&self, work: F) -> Result<TrackedResult<T>, TrackError<E>>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let observer = self.config.observer();
        let SessionOutcome {
            work,
            series,
            tracking_failure,
        } = run_session(&self.config, work)?;

        let value = match work {
            Ok(Ok(value)) => value,
            Ok(Err(source)) => {
                observer.on_phase(TrackerPhase::Failed);
                return Err(TrackError::Work {
                    source,
                    memory_usage: series,
                });
            }
            Err(payload) => {
                observer.on_phase(TrackerPhase::Failed);
                panic::resume_unwind(payload)
            }
        };

        if let Some(reason) = tracking_failure {
            observer.on_phase(TrackerPhase::Failed);
            return Err(TrackError::Tracking {
                reason,
                memory_usage: series,
            });
        }

        let live_objects = self
            .config
            .analyze_gc()
            .then(|| take_census(&self.config));

        observer.on_phase(TrackerPhase::Done);
        Ok(TrackedResult {
            value,
            memory_usage: series,
            live_objects,
        })
    }
}

/// Run `work` under a [`MemoryTracker`] built from `config`
///
/// # Errors
///
/// See [`MemoryTracker::track`]
pub fn track_memory<T, E, F>(
    config: TrackerConfig,
    work: F,
) -> Result<TrackedResult<T>, TrackError<E>>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    MemoryTracker::new(config).track(work)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::observer::{NoopObserver, TrackerObserver};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct PhaseRecorder(Mutex<Vec<TrackerPhase>>);

    impl TrackerObserver for PhaseRecorder {
        fn on_phase(&self, phase: TrackerPhase) {
            self.0.lock().push(phase);
        }
    }

    fn config_with(observer: Arc<dyn TrackerObserver>) -> TrackerConfig {
        TrackerConfig::builder()
            .interval_secs(0.02)
            .observer(observer)
            .build()
            .unwrap()
    }

    #[test]
    fn test_phases_on_success() {
        let recorder = Arc::new(PhaseRecorder::default());
        let tracked = track_memory(config_with(recorder.clone()), || Ok::<_, String>(5)).unwrap();

        assert_eq!(tracked.into_value(), 5);
        assert_eq!(
            *recorder.0.lock(),
            vec![
                TrackerPhase::Configuring,
                TrackerPhase::Running,
                TrackerPhase::Stopping,
                TrackerPhase::Done,
            ]
        );
    }

    #[test]
    fn test_phases_on_work_failure() {
        let recorder = Arc::new(PhaseRecorder::default());
        let result = track_memory(config_with(recorder.clone()), || Err::<(), _>("nope"));

        let error = result.unwrap_err();
        assert!(error.is_work());
        assert_eq!(error.work_error(), Some(&"nope"));
        assert_eq!(recorder.0.lock().last(), Some(&TrackerPhase::Failed));
    }

    #[test]
    fn test_census_absent_unless_requested() {
        let tracked = track_memory(config_with(Arc::new(NoopObserver)), || Ok::<_, String>(())).unwrap();
        assert!(tracked.live_objects().is_none());
    }

    #[test]
    fn test_error_display() {
        let error: TrackError<String> = TrackError::Tracking {
            reason: "probe gone".to_string(),
            memory_usage: Series::new(),
        };
        assert_eq!(error.to_string(), "memory tracking failed: probe gone");
        assert!(error.memory_usage().is_empty());
        assert!(error.work_error().is_none());
    }
}
