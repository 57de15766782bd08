//! Result and error types for Bookload.
//!
//! Errors fall into two groups. [`BookloadError`] covers setup problems
//! (bad configuration, unparsable templates or field paths) and is returned
//! before any traffic is generated. The remaining types describe failures of
//! a single request or session and are recorded, never propagated past the
//! session that produced them.

use std::time::Duration;
use thiserror::Error;

/// Result type for Bookload operations
pub type BookloadResult<T> = Result<T, BookloadError>;

/// Errors raised while building or configuring a run
#[derive(Debug, Error)]
pub enum BookloadError {
    /// Configuration value is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Injection or throttle profile is invalid
    #[error("Invalid profile: {message}")]
    InvalidProfile {
        /// Error message
        message: String,
    },

    /// Request template could not be parsed
    #[error("Invalid template {template:?}: {message}")]
    InvalidTemplate {
        /// Template source
        template: String,
        /// Error message
        message: String,
    },

    /// Field path could not be parsed
    #[error("Invalid field path {path:?}: {message}")]
    InvalidFieldPath {
        /// Path source
        path: String,
        /// Error message
        message: String,
    },

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BookloadError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid profile error
    #[must_use]
    pub fn invalid_profile(message: impl Into<String>) -> Self {
        Self::InvalidProfile {
            message: message.into(),
        }
    }

    /// Create an invalid template error
    #[must_use]
    pub fn invalid_template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create an invalid field path error
    #[must_use]
    pub fn invalid_field_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFieldPath {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Transport-level failure of a single request.
///
/// Recorded as a failed result; the session moves on to its next step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),
    /// No response within the request timeout
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Response arrived but could not be read
    #[error("malformed response: {0}")]
    Body(String),
    /// Anything else the transport reports
    #[error("transport error: {0}")]
    Other(String),
}

/// A template referenced a variable the session never set.
///
/// Fatal for the owning session only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("session variable {name:?} is not set")]
pub struct InterpolationError {
    /// Name of the missing variable
    pub name: String,
}

impl InterpolationError {
    /// Create an error for the given variable name
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A finite feeder ran out of records.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("feeder has no more records")]
pub struct FeederExhausted;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = BookloadError::config("durationSec must be positive");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("durationSec"));
    }

    #[test]
    fn test_invalid_template_error() {
        let err = BookloadError::invalid_template("#{token", "unterminated placeholder");
        let msg = err.to_string();
        assert!(msg.contains("#{token"));
        assert!(msg.contains("unterminated"));
    }

    #[test]
    fn test_interpolation_error_names_variable() {
        let err = InterpolationError::missing("token");
        assert_eq!(err.to_string(), "session variable \"token\" is not set");
    }

    #[test]
    fn test_timeout_display() {
        let err = TransportError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "request timed out after 1500ms");
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err: BookloadError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
