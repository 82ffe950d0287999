//! Core types for memtrail.
//!
//! - **Sample / Series**: the `(timestamp, footprint_mb)` time series a tracked call produces
//! - **SeriesSummary**: peak, average, minimum, duration and sample count
//! - **Error**: the error taxonomy shared by the tracker, renderers and CLI

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod series;

pub use error::{Error, Result};
pub use series::{BYTES_PER_MB, Sample, Series, SeriesSummary};
