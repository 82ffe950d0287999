//! Optional TOML settings for `memtrail run`.
//!
//! ```toml
//! interval = 0.5
//! duration = 60.0
//! format = "all"
//! output = "reports/nightly"
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::cli::{OutputFormat, RunArgs};

/// Default sampling interval for the CLI
pub const DEFAULT_INTERVAL_SECS: f64 = memtrail_tracker::DEFAULT_INTERVAL_SECS;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Values a settings file may supply
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub interval: Option<f64>,
    pub duration: Option<f64>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid settings TOML
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Effective options for one run after merging flags, settings and defaults
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub interval: f64,
    pub duration: Option<f64>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl RunOptions {
    /// Command-line flags win over settings, settings win over defaults
    #[must_use]
    pub fn resolve(args: &RunArgs, settings: Settings) -> Self {
        Self {
            interval: args
                .interval
                .or(settings.interval)
                .unwrap_or(DEFAULT_INTERVAL_SECS),
            duration: args.duration.or(settings.duration),
            format: args.format.or(settings.format).unwrap_or_default(),
            output: args.output.clone().or(settings.output),
        }
    }
}
