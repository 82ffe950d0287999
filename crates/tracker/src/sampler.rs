#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Background sampler polling the process footprint

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use memtrail_core::{Error, Result, Sample, Series};
use parking_lot::{Condvar, Mutex};

use crate::config::{SampleCallback, TrackerConfig};
use crate::observer::TrackerObserver;
use crate::probe::{MemoryProbe, ProbeError};

/// Name of the sampler thread
pub const SAMPLER_THREAD_NAME: &str = "memtrail-sampler";

/// One-shot, idempotent stop flag that also wakes a waiting sampler
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
    stopped: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl StopSignal {
    /// Create an unset signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal; returns `false` if it was already set
    pub fn stop(&self) -> bool {
        if self
            .inner
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
        true
    }

    /// Check if the signal has been set
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Block until the signal is set or the deadline passes; returns whether it was set
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut guard = self.inner.lock.lock();
        while !self.is_stopped() {
            match deadline {
                Some(deadline) => {
                    if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                        return self.is_stopped();
                    }
                }
                None => self.inner.wake.wait(&mut guard),
            }
        }
        true
    }
}

/// Why the sampler thread ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerExit {
    /// The stop signal was observed
    Stopped,
    /// The observation cap was reached
    DurationElapsed,
    /// The observed process no longer exists
    TargetExited,
    /// The footprint could not be read
    Failed(String),
    /// The sampler thread panicked
    Panicked,
    /// The sampler did not stop within the grace period
    Unresponsive,
}

impl SamplerExit {
    /// Failure reason, if this exit is fatal to the tracking session
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        match self {
            Self::Failed(reason) => Some(reason.clone()),
            Self::Panicked => Some("sampler thread panicked".to_string()),
            Self::Stopped | Self::DurationElapsed | Self::TargetExited | Self::Unresponsive => {
                None
            }
        }
    }
}

/// What a stopped sampler hands back
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerReport {
    /// Samples recorded before the sampler stopped
    pub series: Series,
    /// Why the sampler ended
    pub exit: SamplerExit,
}

/// Periodically records the footprint reported by a probe
pub struct Sampler {
    interval: Duration,
    duration: Option<Duration>,
    probe: Arc<dyn MemoryProbe>,
    callback: Option<SampleCallback>,
    observer: Arc<dyn TrackerObserver>,
}

impl Sampler {
    /// Create a sampler from a validated configuration
    #[must_use]
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            interval: config.interval(),
            duration: config.duration(),
            probe: Arc::clone(config.probe()),
            callback: config.callback().cloned(),
            observer: Arc::clone(config.observer()),
        }
    }

    /// Start sampling on a dedicated background thread
    ///
    /// # Errors
    ///
    /// Returns `TrackingFailure` if the thread cannot be spawned
    pub fn spawn(self) -> Result<SamplerHandle> {
        let stop = StopSignal::new();
        let series = Arc::new(Mutex::new(Series::new()));
        let (done_tx, done_rx) = flume::bounded(1);
        let observer = Arc::clone(&self.observer);

        let thread_stop = stop.clone();
        let thread_series = Arc::clone(&series);
        let thread = thread::Builder::new()
            .name(SAMPLER_THREAD_NAME.to_string())
            .spawn(move || {
                let exit = self.run(&thread_series, &thread_stop);
                // The orchestrator may have stopped waiting
                let _ = done_tx.send(exit);
            })
            .map_err(|e| Error::tracking_failure(format!("failed to spawn sampler thread: {e}")))?;

        Ok(SamplerHandle {
            stop,
            series,
            done: done_rx,
            thread: Some(thread),
            observer,
        })
    }

    /// Sampling loop; returns when stopped, capped, or the probe fails
    fn run(&self, series: &Mutex<Series>, stop: &StopSignal) -> SamplerExit {
        let start = Instant::now();
        let cap = self.duration.and_then(|d| start.checked_add(d));

        loop {
            let bytes = match self.probe.resident_bytes() {
                Ok(bytes) => bytes,
                Err(ProbeError::TargetExited { .. }) => return SamplerExit::TargetExited,
                Err(e) => {
                    let reason = e.to_string();
                    self.observer.on_sampler_failure(&reason);
                    return SamplerExit::Failed(reason);
                }
            };

            let elapsed = start.elapsed();
            let sample = Sample::from_bytes(elapsed.as_secs_f64(), bytes);
            series.lock().push(sample);
            self.observer.on_sample(&sample);

            if let Some(callback) = &self.callback {
                self.run_callback(callback, &sample);
            }

            if self.duration.is_some_and(|d| elapsed >= d) {
                return SamplerExit::DurationElapsed;
            }

            let next = start
                .checked_add(next_tick_offset(start.elapsed(), self.interval))
                .map(|tick| cap.map_or(tick, |cap| tick.min(cap)));
            if stop.wait_until(next) {
                return SamplerExit::Stopped;
            }
        }
    }

    fn run_callback(&self, callback: &SampleCallback, sample: &Sample) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            callback(sample.timestamp(), sample.footprint_mb())
        }));
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("callback panicked: {}", panic_message(payload.as_ref())),
        };
        self.observer.on_callback_error(sample, &reason);
    }
}

/// Offset of the first tick boundary strictly after `elapsed`
fn next_tick_offset(elapsed: Duration, interval: Duration) -> Duration {
    let interval_ns = interval.as_nanos().max(1);
    let ticks = elapsed.as_nanos() / interval_ns + 1;
    let nanos = ticks.saturating_mul(interval_ns);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Handle to a running sampler
pub struct SamplerHandle {
    stop: StopSignal,
    series: Arc<Mutex<Series>>,
    done: flume::Receiver<SamplerExit>,
    thread: Option<thread::JoinHandle<()>>,
    observer: Arc<dyn TrackerObserver>,
}

impl SamplerHandle {
    /// Stop the sampler and wait up to `grace` for it to end.
    ///
    /// If the sampler does not end in time it is left running detached; the series
    /// returned is then a snapshot of every sample appended so far.
    #[must_use]
    pub fn stop_and_join(mut self, grace: Duration) -> SamplerReport {
        self.stop.stop();

        let exit = match self.done.recv_timeout(grace) {
            Ok(exit) => {
                self.join_thread();
                exit
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join_thread();
                SamplerExit::Panicked
            }
            Err(RecvTimeoutError::Timeout) => {
                self.observer.on_join_timeout(grace);
                let series = self.series.lock().clone();
                return SamplerReport {
                    series,
                    exit: SamplerExit::Unresponsive,
                };
            }
        };

        let series = std::mem::take(&mut *self.series.lock());
        SamplerReport { series, exit }
    }

    fn join_thread(&mut self) {
        if let Some(thread) = self.thread.take() {
            // A panic was already reported through the closed channel
            let _ = thread.join();
        }
    }
}
