//! Static PNG line chart.
//!
//! The chart carries no text so that rendering never depends on system fonts:
//! a light grid, the footprint line and one marker per sample.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::ops::Range;
use std::path::Path;

use memtrail_core::{Error, Result, Series};
use plotters::prelude::*;
use tracing::info;

use crate::output::{persist, require_samples, staging_file};

/// Output size in pixels
const PLOT_SIZE: (u32, u32) = (1200, 600);

/// Horizontal grid lines drawn across the value axis
const GRID_LINES: u32 = 8;

const BACKGROUND: RGBColor = RGBColor(0x16, 0x1b, 0x22);
const GRID: RGBColor = RGBColor(0x30, 0x36, 0x3d);
const LINE: RGBColor = RGBColor(0x58, 0xa6, 0xff);

/// Render a series as a PNG line chart.
///
/// # Errors
///
/// Returns error if:
/// - The series is empty (`EmptyInput`)
/// - The destination cannot be written (`IoFailure`)
/// - Drawing fails (`Render`)
pub fn plot_png(series: &Series, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    require_samples(series)?;

    let staging = staging_file(path)?;
    draw(series, staging.path())?;
    persist(staging, path)?;

    info!(path = %path.display(), samples = series.len(), "Memory plot saved");
    Ok(())
}

fn draw(series: &Series, target: &Path) -> Result<()> {
    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|s| (s.timestamp(), s.footprint_mb()))
        .collect();
    let x_range = padded(0.0, series.last_timestamp().unwrap_or(0.0), 0.0);
    let y_range = padded(
        series.minimum().unwrap_or(0.0),
        series.peak().unwrap_or(0.0),
        0.05,
    );

    let root = BitMapBackend::new(target, PLOT_SIZE).into_drawing_area();
    root.fill(&BACKGROUND).map_err(Error::render)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(24)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(Error::render)?;

    let step = (y_range.end - y_range.start) / f64::from(GRID_LINES);
    chart
        .draw_series((0..=GRID_LINES).map(|i| {
            let y = f64::from(i).mul_add(step, y_range.start);
            PathElement::new(vec![(x_range.start, y), (x_range.end, y)], GRID.stroke_width(1))
        }))
        .map_err(Error::render)?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), LINE.stroke_width(2)))
        .map_err(Error::render)?;
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, LINE.filled())))
        .map_err(Error::render)?;

    root.present().map_err(Error::render)
}

/// Axis range around `[low, high]`, widened so it is never degenerate
fn padded(low: f64, high: f64, fraction: f64) -> Range<f64> {
    let span = high - low;
    if span <= f64::EPSILON {
        let pad = if high.abs() > f64::EPSILON { high.abs() * 0.1 } else { 1.0 };
        return (low - pad)..(high + pad);
    }
    let pad = span * fraction;
    (low - pad)..(high + pad)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use memtrail_core::Sample;

    #[test]
    fn test_padded_degenerate_range() {
        let range = padded(5.0, 5.0, 0.05);
        assert!(range.start < 5.0 && range.end > 5.0);

        let range = padded(0.0, 0.0, 0.0);
        assert!(range.start < 0.0 && range.end > 0.0);
    }

    #[test]
    fn test_plot_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots/memory.png");
        let series: Series = vec![
            Sample::new(0.0, 23.1),
            Sample::new(1.0, 130.5),
            Sample::new(2.0, 130.7),
        ]
        .into();

        plot_png(&series, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_plot_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.png");

        assert_eq!(plot_png(&Series::new(), &path), Err(Error::EmptyInput));
        assert!(!path.exists());
    }
}
