//! Application-wide error types.
//!
//! Per-track failures never travel as errors: the worker pool captures them
//! into [`crate::pipeline::TranscodeOutcome`] values and the run continues.
//! This type covers the failures that end a whole run: bad configuration,
//! an unusable encoding environment, or a user interrupt.

use crate::config::ConfigError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A run-terminating error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The encoding environment is unusable
    #[error("environment not ready: FFmpeg with libfdk_aac is not available")]
    EnvironmentNotReady,

    /// The run was interrupted by the user
    #[error("operation cancelled by user")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_error_display() {
        let err = Error::EnvironmentNotReady;
        assert!(err.to_string().contains("libfdk_aac"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Invalid("workers must be >= 1".to_string()).into();
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("workers"));
    }

    #[test]
    fn test_cancelled_display() {
        assert!(Error::Cancelled.to_string().contains("cancelled"));
    }
}
