//! logwitness: per-test log capture and assertions
//!
//! Code under test logs as usual; each test owns a buffer of everything that
//! was logged and asserts on it with pattern matchers.
//!
//! # Architecture
//!
//! ```text
//! tracing events ──► CaptureLayer ─┐
//!                                  ├─► LoggerProvider ─► ContextLogger ─► LogValidationContext ─► LogMessageBuffer
//! explicit logger calls ───────────┘                                             ▲
//!                                                                                │
//!                                      test: received / not_received ────────────┘
//! ```
//!
//! # Modules
//!
//! - `message`: captured records (`LogMessage`, `LogLevel`, `CapturedError`)
//! - `comparer`: match strategies (`MatchMode`, `LogMessageComparer`)
//! - `buffer`: lock-free per-test message buffer
//! - `scope`: scope state and per-thread scope stacks
//! - `context`: capture path and assertions (`LogValidationContext`)
//! - `provider`: per-category loggers bound to a context
//! - `layer`: `tracing_subscriber` layer feeding a context
//! - `fixture`: `LogCapture`, the per-test entry point
//! - `config`: capture settings (TOML + environment)
//! - `logging`: diagnostics subscriber and the test-output mirror
//! - `error`: error types
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod buffer;
pub mod comparer;
pub mod config;
pub mod context;
pub mod error;
pub mod fixture;
pub mod layer;
pub mod logging;
pub mod message;
pub mod provider;
pub mod scope;

pub use buffer::LogMessageBuffer;
pub use comparer::{LogMessageComparer, MatchMode};
pub use config::CaptureConfig;
pub use context::{Expectation, LogValidationContext};
pub use error::{Error, LogAssertionError, Result, ScopeError};
pub use fixture::LogCapture;
pub use layer::CaptureLayer;
pub use message::{CapturedError, EventId, LogLevel, LogMessage};
pub use provider::{ContextLogger, LoggerProvider};
pub use scope::{ScopeGuard, ScopeState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
