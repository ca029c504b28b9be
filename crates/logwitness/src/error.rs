//! Error types for logwitness

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for logwitness
#[derive(Error, Debug)]
pub enum Error {
    /// A log assertion did not hold
    #[error(transparent)]
    Assertion(#[from] LogAssertionError),

    /// Scope guards were released out of order
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),

    /// Capture configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Diagnostics logging setup errors
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),
}

/// A failed log assertion.
///
/// The text is rendered when the assertion fails, so it survives being
/// handed to the test harness after the context is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rendered}")]
pub struct LogAssertionError {
    rendered: String,
}

impl LogAssertionError {
    #[must_use]
    pub fn new(rendered: impl Into<String>) -> Self {
        Self {
            rendered: rendered.into(),
        }
    }

    /// The full diagnostic text.
    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }
}

/// Scope stack consistency failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope was closed while `depth` newer scopes on the same thread
    /// were still open. The frame is removed anyway.
    #[error("scope closed out of order ({depth} newer scope(s) still open)")]
    OutOfOrder { depth: usize },

    /// The scope's frame was no longer on the stack (the context was cleared).
    #[error("scope frame not found on the stack")]
    Missing,
}

/// Capture configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse capture config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
