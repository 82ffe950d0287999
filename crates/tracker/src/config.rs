#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Configuration for tracked calls

use std::sync::Arc;
use std::time::Duration;

use memtrail_core::{Error, Result};

use crate::census::{CensusSource, LiveRegistry, ProcessCensus};
use crate::observer::{TracingObserver, TrackerObserver};
use crate::probe::{MemoryProbe, default_probe};

/// Default sampling interval
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// How long a tracked call waits for its sampler to stop
pub const DEFAULT_JOIN_GRACE: Duration = Duration::from_secs(5);

/// Default census threshold in kilobytes
pub const DEFAULT_CENSUS_MIN_SIZE_KB: f64 = 100.0;

/// Error a sample callback may return
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Invoked on the sampler thread after each sample with `(timestamp, footprint_mb)`
pub type SampleCallback = Arc<dyn Fn(f64, f64) -> std::result::Result<(), CallbackError> + Send + Sync>;

/// Validated, immutable configuration for one tracker
#[derive(Clone)]
pub struct TrackerConfig {
    /// Interval between samples
    interval: Duration,

    /// Cap on the observation window
    duration: Option<Duration>,

    /// Called after every sample
    callback: Option<SampleCallback>,

    /// Run a live-object census after the work completes
    analyze_gc: bool,

    /// Census threshold in kilobytes
    census_min_size_kb: f64,

    /// Maximum wait for the sampler to stop
    join_grace: Duration,

    probe: Arc<dyn MemoryProbe>,
    observer: Arc<dyn TrackerObserver>,
    census_source: Arc<dyn CensusSource>,
}

impl TrackerConfig {
    /// Start building a configuration
    ///
    /// # Examples
    ///
    /// ```
    /// # use memtrail_tracker::TrackerConfig;
    /// let config = TrackerConfig::builder()
    ///     .interval_secs(0.5)
    ///     .analyze_gc(true)
    ///     .build();
    /// assert!(config.is_ok());
    ///
    /// let invalid = TrackerConfig::builder().interval_secs(-1.0).build();
    /// assert!(invalid.is_err());
    /// ```
    #[must_use]
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Configuration with the given interval and defaults otherwise
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the interval is not positive
    pub fn with_interval_secs(interval: f64) -> Result<Self> {
        Self::builder().interval_secs(interval).build()
    }

    /// Same configuration observing a different process
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Get the sampling interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Get the observation cap
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Get the sample callback
    #[must_use]
    pub fn callback(&self) -> Option<&SampleCallback> {
        self.callback.as_ref()
    }

    /// Whether a census runs after the work
    #[must_use]
    pub const fn analyze_gc(&self) -> bool {
        self.analyze_gc
    }

    /// Census threshold in kilobytes
    #[must_use]
    pub const fn census_min_size_kb(&self) -> f64 {
        self.census_min_size_kb
    }

    /// Grace period for the sampler join
    #[must_use]
    pub const fn join_grace(&self) -> Duration {
        self.join_grace
    }

    /// Footprint source
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn MemoryProbe> {
        &self.probe
    }

    /// Event observer
    #[must_use]
    pub fn observer(&self) -> &Arc<dyn TrackerObserver> {
        &self.observer
    }

    /// Source the census walks
    #[must_use]
    pub fn census_source(&self) -> &Arc<dyn CensusSource> {
        &self.census_source
    }
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("interval", &self.interval)
            .field("duration", &self.duration)
            .field("callback", &self.callback.is_some())
            .field("analyze_gc", &self.analyze_gc)
            .field("census_min_size_kb", &self.census_min_size_kb)
            .field("join_grace", &self.join_grace)
            .field("probe_pid", &self.probe.pid())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TrackerConfig`]; nothing is validated until [`build`](Self::build)
#[must_use]
pub struct TrackerConfigBuilder {
    interval_secs: f64,
    duration_secs: Option<f64>,
    callback: Option<SampleCallback>,
    analyze_gc: bool,
    census_min_size_kb: f64,
    join_grace: Duration,
    probe: Option<Arc<dyn MemoryProbe>>,
    observer: Option<Arc<dyn TrackerObserver>>,
    census_source: Option<Arc<dyn CensusSource>>,
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            duration_secs: None,
            callback: None,
            analyze_gc: false,
            census_min_size_kb: DEFAULT_CENSUS_MIN_SIZE_KB,
            join_grace: DEFAULT_JOIN_GRACE,
            probe: None,
            observer: None,
            census_source: None,
        }
    }
}

impl TrackerConfigBuilder {
    /// Sampling interval in seconds; must be positive
    pub fn interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Sampling interval
    pub fn interval(self, interval: Duration) -> Self {
        self.interval_secs(interval.as_secs_f64())
    }

    /// Cap on the observation window in seconds; must be positive
    pub fn duration_secs(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Cap on the observation window
    pub fn duration(self, duration: Duration) -> Self {
        self.duration_secs(duration.as_secs_f64())
    }

    /// Callback invoked on the sampler thread after each sample
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64, f64) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Run a live-object census after the work completes
    pub fn analyze_gc(mut self, enabled: bool) -> Self {
        self.analyze_gc = enabled;
        self
    }

    /// Census threshold in kilobytes; must not be negative
    pub fn census_min_size_kb(mut self, min_size_kb: f64) -> Self {
        self.census_min_size_kb = min_size_kb;
        self
    }

    /// Maximum wait for the sampler to stop
    pub fn join_grace(mut self, grace: Duration) -> Self {
        self.join_grace = grace;
        self
    }

    /// Footprint source; defaults to the current process
    pub fn probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Event observer; defaults to [`TracingObserver`]
    pub fn observer(mut self, observer: Arc<dyn TrackerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Census over `registry` plus the heap allocator when installed
    pub fn registry(self, registry: Arc<LiveRegistry>) -> Self {
        self.census_source(Arc::new(ProcessCensus::new(registry)))
    }

    /// Source the census walks; defaults to [`ProcessCensus::global`]
    pub fn census_source(mut self, source: Arc<dyn CensusSource>) -> Self {
        self.census_source = Some(source);
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if:
    /// - The interval is not a positive finite number of seconds
    /// - The duration is set and not a positive finite number of seconds
    /// - The census threshold is negative or NaN
    pub fn build(self) -> Result<TrackerConfig> {
        let interval = positive_duration("interval", self.interval_secs)?;
        let duration = self
            .duration_secs
            .map(|secs| positive_duration("duration", secs))
            .transpose()?;
        validate_census_threshold(self.census_min_size_kb)?;

        Ok(TrackerConfig {
            interval,
            duration,
            callback: self.callback,
            analyze_gc: self.analyze_gc,
            census_min_size_kb: self.census_min_size_kb,
            join_grace: self.join_grace,
            probe: self.probe.unwrap_or_else(default_probe),
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver)),
            census_source: self
                .census_source
                .unwrap_or_else(|| Arc::new(ProcessCensus::global())),
        })
    }
}

/// Validate a seconds value and convert it to a `Duration`
fn positive_duration(name: &str, secs: f64) -> Result<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(Error::invalid_argument(format!(
            "{name} must be positive, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::invalid_argument(format!("{name} out of range ({secs}): {e}")))
}

/// Validate a census threshold
pub(crate) fn validate_census_threshold(min_size_kb: f64) -> Result<()> {
    if min_size_kb.is_nan() || min_size_kb < 0.0 {
        Err(Error::invalid_argument(format!(
            "min_size_kb must be non-negative, got {min_size_kb}"
        )))
    } else {
        Ok(())
    }
}
