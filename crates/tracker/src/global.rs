#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Unscoped tracking of a whole program run.
//!
//! Instead of handing the series back, a [`GlobalTracker`] writes it to every
//! configured [`ExportSink`] once the work has ended. Sinks run one after another
//! and a failing sink never stops the next one or changes the work's result.

use std::fmt::Display;
use std::panic;
use std::path::{Path, PathBuf};

use memtrail_core::{Result, Series};

use crate::config::TrackerConfig;
use crate::tracker::{SessionOutcome, TrackError, TrackerPhase, run_session};

/// File destination for a finished series
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSink {
    /// Static line chart
    Png(PathBuf),
    /// Canonical `[[timestamp, footprint_mb], ...]` dump
    Json(PathBuf),
    /// `timestamp_seconds,memory_mb` table
    Csv(PathBuf),
}

impl ExportSink {
    /// Short name of the output format
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Png(_) => "png",
            Self::Json(_) => "json",
            Self::Csv(_) => "csv",
        }
    }

    /// Destination path
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Png(path) | Self::Json(path) | Self::Csv(path) => path,
        }
    }

    /// Write the series to this sink
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` for an empty series, `IoFailure` or `Render` if the file
    /// cannot be produced
    pub fn export(&self, series: &Series) -> Result<()> {
        match self {
            Self::Png(path) => memtrail_report::plot_png(series, path),
            Self::Json(path) => memtrail_report::export_json(series, path),
            Self::Csv(path) => memtrail_report::export_csv(series, path),
        }
    }
}

/// Tracks a program entry point and exports the series as a side effect
#[derive(Debug, Clone)]
pub struct GlobalTracker {
    config: TrackerConfig,
    sinks: Vec<ExportSink>,
}

impl GlobalTracker {
    /// Create a tracker with no sinks
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
        }
    }

    /// Add an export sink
    #[must_use]
    pub fn with_sink(mut self, sink: ExportSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add several export sinks
    #[must_use]
    pub fn with_sinks(mut self, sinks: impl IntoIterator<Item = ExportSink>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Configured sinks, in export order
    #[must_use]
    pub fn sinks(&self) -> &[ExportSink] {
        &self.sinks
    }

    /// Run `work` while sampling, then export the series to every sink.
    ///
    /// Exports happen whether the work succeeded, failed or panicked. A panic is
    /// resumed once the exports are done.
    ///
    /// # Errors
    ///
    /// - `TrackError::Work` if the work returns an error
    /// - `TrackError::Tracking` if the work succeeded but the footprint could not be sampled
    pub fn run<T, E, F>(&self, work: F) -> std::result::Result<T, TrackError<E>>
    where
        E: Display,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let observer = self.config.observer();
        let SessionOutcome {
            work,
            series,
            tracking_failure,
        } = run_session(&self.config, work)?;

        self.export_all(&series);

        match work {
            Ok(Ok(value)) => match tracking_failure {
                None => {
                    observer.on_phase(TrackerPhase::Done);
                    Ok(value)
                }
                Some(reason) => {
                    observer.on_phase(TrackerPhase::Failed);
                    Err(TrackError::Tracking {
                        reason,
                        memory_usage: series,
                    })
                }
            },
            Ok(Err(source)) => {
                observer.on_phase(TrackerPhase::Failed);
                Err(TrackError::Work {
                    source,
                    memory_usage: series,
                })
            }
            Err(payload) => {
                observer.on_phase(TrackerPhase::Failed);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Attempt every sink; failures are reported and skipped
    fn export_all(&self, series: &Series) {
        let observer = self.config.observer();
        for sink in &self.sinks {
            match sink.export(series) {
                Ok(()) => observer.on_export(sink.kind(), sink.path()),
                Err(e) => observer.on_export_failure(sink.kind(), sink.path(), &e),
            }
        }
    }
}

/// Run `work` under a [`GlobalTracker`] exporting to `sinks`
///
/// # Errors
///
/// See [`GlobalTracker::run`]
pub fn global_tracker<T, E, F>(
    config: TrackerConfig,
    sinks: impl IntoIterator<Item = ExportSink>,
    work: F,
) -> std::result::Result<T, TrackError<E>>
where
    E: Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    GlobalTracker::new(config).with_sinks(sinks).run(work)
}
