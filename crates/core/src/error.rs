//! Error types shared by the tracker, the renderers and the CLI.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for memtrail operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for memtrail operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Bad configuration or argument, rejected before any work starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A renderer was handed a series without samples.
    #[error("no memory data provided: series is empty")]
    EmptyInput,

    /// Destination could not be created or written.
    #[error("failed to write '{path}': {reason}")]
    IoFailure { path: PathBuf, reason: String },

    /// Input data has the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("render error: {0}")]
    Render(String),

    /// The sampler could not read the process footprint.
    #[error("memory tracking failed: {0}")]
    TrackingFailure(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create an I/O failure for a destination path.
    pub fn io_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::IoFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Create a render error.
    pub fn render(reason: impl ToString) -> Self {
        Self::Render(reason.to_string())
    }

    /// Create a tracking failure.
    pub fn tracking_failure(reason: impl Into<String>) -> Self {
        Self::TrackingFailure(reason.into())
    }

    /// Whether this error was raised by argument validation.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::io_failure("/tmp/out.csv", "permission denied");
        assert!(err.to_string().contains("/tmp/out.csv"));
        assert!(err.to_string().contains("permission denied"));

        let err = Error::invalid_argument("interval must be positive, got -1");
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_empty_input_display() {
        assert!(Error::EmptyInput.to_string().contains("empty"));
        assert!(!Error::EmptyInput.is_invalid_argument());
    }
}
