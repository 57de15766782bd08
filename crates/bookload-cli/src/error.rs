//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Logging could not be initialised
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// The async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(std::io::Error),

    /// Bookload library error
    #[error("Bookload error: {0}")]
    Bookload(#[from] bookload::BookloadError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Transport(#[from] bookload::TransportError),

    /// Run finished but at least one assertion failed
    #[error("{failed} of {total} assertions failed")]
    AssertionsFailed {
        /// Failed assertions
        failed: usize,
        /// All assertions
        total: usize,
    },
}

impl CliError {
    /// Create a logging error
    #[must_use]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}
