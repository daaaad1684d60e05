//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Built without a browser backend
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mirador library error
    #[error("{0}")]
    Mirador(#[from] mirador::MiradorError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the error means the suite ran and found failures
    #[must_use]
    pub const fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::Mirador(
                mirador::MiradorError::AssertionFailure { .. }
                    | mirador::MiradorError::UnexpectedConsoleEvent { .. }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad suite");
        assert_eq!(err.to_string(), "Configuration error: bad suite");
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("--jobs");
        assert!(err.to_string().contains("--jobs"));
    }

    #[test]
    fn test_mirador_error_is_transparent() {
        let err: CliError = mirador::MiradorError::config("x").into();
        assert_eq!(err.to_string(), "Configuration error: x");
        assert!(!err.is_check_failure());
    }

    #[test]
    fn test_check_failure() {
        let err: CliError = mirador::MiradorError::AssertionFailure {
            message: "title".to_string(),
        }
        .into();
        assert!(err.is_check_failure());
    }
}
