//! Result and error types for Mirador.

use thiserror::Error;

/// Result type for Mirador operations
pub type MiradorResult<T> = Result<T, MiradorError>;

/// Errors that can occur in Mirador
#[derive(Debug, Error)]
pub enum MiradorError {
    /// The page handle cannot be observed (navigation never completed, handle closed)
    #[error("Collection failed: {message}")]
    Collection {
        /// Error message
        message: String,
    },

    /// A click or other interaction exceeded its bound
    #[error("Interaction with {target} timed out after {ms}ms")]
    InteractionTimeout {
        /// Locator of the element the interaction addressed
        target: String,
        /// Bound in milliseconds
        ms: u64,
    },

    /// One or more verdicts failed
    #[error("Assertion failed: {message}")]
    AssertionFailure {
        /// Error message
        message: String,
    },

    /// Recorded console events exceeded an allowed-count threshold
    #[error("Unexpected console events for rule '{rule}': {found} found, {max_allowed} allowed")]
    UnexpectedConsoleEvent {
        /// Rule name
        rule: String,
        /// Number of matching entries
        found: usize,
        /// Threshold
        max_allowed: usize,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Readiness condition not reached in time
    #[error("Page {url} did not become ready within {ms}ms")]
    NavigationTimeout {
        /// URL being loaded
        url: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Event subscription error
    #[error("Event subscription failed: {message}")]
    Subscription {
        /// Error message
        message: String,
    },

    /// Interaction error other than a timeout
    #[error("Interaction with {target} failed: {message}")]
    Interaction {
        /// Locator of the element
        target: String,
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Suite file or rule configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid URL pattern in a rule
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl MiradorError {
    /// Create a collection error
    #[must_use]
    pub fn collection(message: impl Into<String>) -> Self {
        Self::Collection {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error is a downgradable interaction timeout
    #[must_use]
    pub const fn is_interaction_timeout(&self) -> bool {
        matches!(self, Self::InteractionTimeout { .. })
    }
}
