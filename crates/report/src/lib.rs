//! Renderers for memtrail series.
//!
//! Every renderer takes a finished [`Series`](memtrail_core::Series) and a destination path:
//!
//! - [`plot_png`]: static line chart
//! - [`export_csv`]: `timestamp_seconds,memory_mb` table
//! - [`export_html`]: self-contained interactive report
//! - [`export_json`] / [`read_json`]: the canonical `[[timestamp, memory_mb], ...]` format
//!
//! All of them fail with `EmptyInput` on an empty series and with `IoFailure` when the
//! destination cannot be written. Output is staged next to the destination and moved into
//! place only once complete.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod csv;
pub mod html;
pub mod json;
mod output;
pub mod plot;

pub use csv::{CSV_HEADER, export_csv};
pub use html::{export_html, render_html};
pub use json::{export_json, read_json};
pub use plot::plot_png;
