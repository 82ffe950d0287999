//! Delimited text export.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;

use memtrail_core::{Result, Series};
use tracing::info;

use crate::output::{require_samples, write_atomic};

/// Header row of the CSV export
pub const CSV_HEADER: &str = "timestamp_seconds,memory_mb";

/// Export a series as CSV: the header, then one row per sample in series order.
///
/// # Errors
///
/// Returns error if:
/// - The series is empty (`EmptyInput`)
/// - The destination or its parent directory cannot be written (`IoFailure`)
pub fn export_csv(series: &Series, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    require_samples(series)?;

    write_atomic(path, |w| {
        writeln!(w, "{CSV_HEADER}")?;
        series
            .iter()
            .try_for_each(|s| writeln!(w, "{},{}", s.timestamp(), s.footprint_mb()))
    })?;

    info!(path = %path.display(), samples = series.len(), "Memory data exported to CSV");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use memtrail_core::{Error, Sample};

    #[test]
    fn test_csv_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.csv");
        let series: Series = vec![Sample::new(0.0, 23.1), Sample::new(1.0, 130.5)].into();

        export_csv(&series, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![CSV_HEADER, "0,23.1", "1,130.5"]);
    }

    #[test]
    fn test_csv_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.csv");

        assert_eq!(export_csv(&Series::new(), &path), Err(Error::EmptyInput));
        assert!(!path.exists());
    }
}
