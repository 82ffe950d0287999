//! Memory footprint tracking for Rust workloads.
//!
//! A tracked call runs a unit of work while a background sampler polls the resident
//! footprint of the process at a fixed interval:
//!
//! - [`MemoryTracker`] / [`track_memory`]: hand the series back with the work's value
//! - [`GlobalTracker`] / [`global_tracker`]: return only the work's value and write the
//!   series to [`ExportSink`]s
//! - [`HeapTracker`]: global allocator feeding the live-object census by size class
//! - [`LiveRegistry`] / [`Tracked`]: opt-in census entries grouped by type
//! - [`TrackerObserver`]: injected event sink, [`TracingObserver`] by default
//!
//! Failures of the work always win over failures of the tracker; tracker trouble
//! degrades to warnings and partial results.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod census;
pub mod config;
pub mod global;
pub mod heap;
pub mod observer;
pub mod probe;
pub mod process;
pub mod sampler;
pub mod tracker;

pub use census::{
    Census, CensusEntry, CensusSource, LiveRegistry, ProcessCensus, Registration, Tracked,
    analyze_live_objects,
};
pub use config::{
    CallbackError, DEFAULT_CENSUS_MIN_SIZE_KB, DEFAULT_INTERVAL_SECS, DEFAULT_JOIN_GRACE,
    SampleCallback, TrackerConfig, TrackerConfigBuilder,
};
pub use global::{ExportSink, GlobalTracker, global_tracker};
pub use heap::{HeapTracker, heap_census};
pub use observer::{NoopObserver, TracingObserver, TrackerObserver};
pub use probe::{
    MemoryMetrics, MemoryProbe, ProbeError, ProcStatusProbe, SysinfoProbe, default_probe,
    probe_for_pid,
};
pub use process::{ChildProcess, ProcessError};
pub use sampler::{Sampler, SamplerExit, SamplerHandle, SamplerReport, StopSignal};
pub use tracker::{MemoryTracker, TrackError, TrackedResult, TrackerPhase, track_memory};
