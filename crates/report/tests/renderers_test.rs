//! Integration tests for the renderers as a set.
//!
//! These tests verify that:
//! - Every renderer rejects an empty series without touching the filesystem
//! - A JSON export converts into every other format

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use memtrail_core::{Error, Result, Sample, Series};
use memtrail_report::{export_csv, export_html, export_json, plot_png, read_json};

type Renderer = fn(&Series, &Path) -> Result<()>;

fn png(series: &Series, path: &Path) -> Result<()> {
    plot_png(series, path)
}

fn csv(series: &Series, path: &Path) -> Result<()> {
    export_csv(series, path)
}

fn html(series: &Series, path: &Path) -> Result<()> {
    export_html(series, path)
}

fn json(series: &Series, path: &Path) -> Result<()> {
    export_json(series, path)
}

fn renderers() -> [(&'static str, Renderer); 4] {
    [
        ("png", png as Renderer),
        ("csv", csv as Renderer),
        ("html", html as Renderer),
        ("json", json as Renderer),
    ]
}

/// Empty input never leaves a partial file behind.
///
/// # GIVEN
/// An empty series and a destination inside a directory that does not exist yet
///
/// # WHEN
/// Each renderer is invoked
///
/// # THEN
/// Each fails with `EmptyInput` and neither the file nor its directory is created
#[test]
fn test_empty_series_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();

    for (ext, render) in renderers() {
        let parent = dir.path().join(format!("out-{ext}"));
        let path = parent.join(format!("memory.{ext}"));

        let result = render(&Series::new(), &path);

        assert_eq!(result, Err(Error::EmptyInput), "{ext} should reject empty input");
        assert!(!parent.exists(), "{ext} should not create directories");
    }
}

/// The JSON file is the interchange format between a run and later conversions.
///
/// # GIVEN
/// A series exported to JSON
///
/// # WHEN
/// It is read back and rendered to the other formats
///
/// # THEN
/// The read series equals the exported one and every output file exists
#[test]
fn test_json_converts_to_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let series: Series = (0..20)
        .map(|i| Sample::new(f64::from(i) * 0.1, 50.0 + f64::from(i % 7)))
        .collect();

    let json_path = dir.path().join("run.json");
    export_json(&series, &json_path).unwrap();
    let restored = read_json(&json_path).unwrap();
    assert_eq!(restored, series);

    for (ext, render) in renderers() {
        let path = dir.path().join(format!("converted.{ext}"));
        render(&restored, &path).unwrap();
        assert!(path.exists(), "{ext} output should exist");
    }
}

/// A destination whose parent is a regular file cannot be written.
#[test]
fn test_unwritable_destination() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let series: Series = vec![Sample::new(0.0, 1.0)].into();

    for (ext, render) in renderers() {
        let path = blocker.join(format!("memory.{ext}"));
        let result = render(&series, &path);
        assert!(
            matches!(result, Err(Error::IoFailure { .. })),
            "{ext} should report IoFailure, got {result:?}"
        );
    }
}
