//! Canonical on-disk series format: an array of `[timestamp, footprint_mb]` pairs.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use memtrail_core::{Error, Result, Series};
use tracing::info;

use crate::output::{require_samples, write_atomic};

/// Write a series as pretty-printed JSON pairs.
///
/// # Errors
///
/// Returns error if the series is empty or the destination cannot be written
pub fn export_json(series: &Series, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    require_samples(series)?;

    write_atomic(path, |w| {
        serde_json::to_writer_pretty(&mut *w, series).map_err(std::io::Error::other)?;
        writeln!(w)
    })?;

    info!(path = %path.display(), samples = series.len(), "Memory data exported to JSON");
    Ok(())
}

/// Read a series previously written by [`export_json`].
///
/// # Errors
///
/// Returns error if:
/// - The file cannot be opened (`IoFailure`)
/// - The content is not a list of `[timestamp, memory]` pairs (`InvalidInput`)
pub fn read_json(path: impl AsRef<Path>) -> Result<Series> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io_failure(path, e))?;

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        Error::invalid_input(format!(
            "expected list of [timestamp, memory] pairs in '{}': {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use memtrail_core::Sample;

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let series: Series = vec![
            Sample::new(0.0, 23.123_456_789),
            Sample::new(0.1000001, 130.5),
            Sample::new(0.2, 130.7),
        ]
        .into();

        export_json(&series, &path).unwrap();
        let back = read_json(&path).unwrap();

        assert_eq!(back, series);
    }

    #[test]
    fn test_read_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"timestamp": 0.0}"#).unwrap();

        assert!(matches!(read_json(&path), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_json(dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::IoFailure { .. })));
    }
}
