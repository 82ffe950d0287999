//! Destination handling shared by every renderer.
//!
//! Content is written into a temporary file next to the destination and then
//! persisted over it, so a failed render never leaves a partial file behind.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memtrail_core::{Error, Result, Series};
use tempfile::NamedTempFile;

/// Reject an empty series before the filesystem is touched
pub(crate) fn require_samples(series: &Series) -> Result<()> {
    if series.is_empty() {
        Err(Error::EmptyInput)
    } else {
        Ok(())
    }
}

/// Create the destination's parent directory, returning it
pub(crate) fn prepare_parent(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    fs::create_dir_all(&parent).map_err(|e| {
        Error::io_failure(path, format!("cannot create '{}': {e}", parent.display()))
    })?;

    Ok(parent)
}

/// Temporary file in the destination directory carrying the destination's extension
pub(crate) fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let parent = prepare_parent(path)?;
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(".memtrail-")
        .suffix(&suffix)
        .tempfile_in(&parent)
        .map_err(|e| Error::io_failure(path, e))
}

/// Move a fully written staging file over the destination
pub(crate) fn persist(staging: NamedTempFile, path: &Path) -> Result<()> {
    staging
        .persist(path)
        .map(|_| ())
        .map_err(|e| Error::io_failure(path, e.error))
}

/// Write text content atomically to `path`
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let staging = staging_file(path)?;
    {
        let mut writer = BufWriter::new(staging.as_file());
        write(&mut writer).map_err(|e| Error::io_failure(path, e))?;
        writer.flush().map_err(|e| Error::io_failure(path, e))?;
    }
    persist(staging, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use memtrail_core::Sample;

    #[test]
    fn test_require_samples() {
        assert_eq!(require_samples(&Series::new()), Err(Error::EmptyInput));

        let series: Series = vec![Sample::new(0.0, 1.0)].into();
        assert!(require_samples(&series).is_ok());
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.txt");

        write_atomic(&path, |w| w.write_all(b"hello")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let result = write_atomic(&path, |_| Err(std::io::Error::other("boom")));

        assert!(matches!(result, Err(Error::IoFailure { .. })));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let result = prepare_parent(&blocker.join("out.csv"));
        assert!(matches!(result, Err(Error::IoFailure { .. })));
    }
}
