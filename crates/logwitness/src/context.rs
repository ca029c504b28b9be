//! Per-test log validation context
//!
//! [`LogValidationContext`] is where captured records land and where tests
//! ask questions about them. One context belongs to one test: create it at
//! setup (usually through [`LogCapture`](crate::fixture::LogCapture)), hand it
//! to whatever needs a logger, and assert on it at the end.
//!
//! ```ignore
//! use logwitness::{Expectation, LogLevel, LogValidationContext, MatchMode};
//!
//! let ctx = LogValidationContext::new();
//! run_code_under_test(&ctx);
//! ctx.received("connected")
//!     .received(Expectation::new(r"retry \d+").level(LogLevel::Warning).mode(MatchMode::Regex));
//! ```
//!
//! # Failure output
//!
//! When an assertion fails, the error text lists the expectation followed by
//! a replay of the buffered messages. The replay is bounded by the replay
//! cutoff (default [`DEFAULT_REPLAY_CUTOFF`]): above it, a truncation notice
//! is printed and only the most recent messages are shown.

use std::fmt::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::LogMessageBuffer;
use crate::comparer::{LogMessageComparer, MatchMode};
use crate::error::LogAssertionError;
use crate::message::{CapturedError, EventId, LogLevel, LogMessage};
use crate::scope::{ScopeGuard, ScopeStack, ScopeState};

/// Number of buffered messages replayed in a failure message by default.
pub const DEFAULT_REPLAY_CUTOFF: usize = 20;

/// Replay text used when nothing was captured.
pub const NO_MESSAGES_MARKER: &str = "<no messages received>";

/// Message text stored when a formatter panics.
pub const FORMATTER_PANIC_PLACEHOLDER: &str = "[message formatter panicked]";

// ---------------------------------------------------------------------------
// Expectation
// ---------------------------------------------------------------------------

/// What a test expects to find in the buffer.
///
/// Plain strings convert into an expectation at [`LogLevel::Information`]
/// with [`MatchMode::Contains`] and no error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    message: String,
    level: LogLevel,
    mode: MatchMode,
    error: Option<CapturedError>,
}

impl Expectation {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Information,
            mode: MatchMode::Contains,
            error: None,
        }
    }

    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn error(mut self, error: CapturedError) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn match_mode(&self) -> MatchMode {
        self.mode
    }

    /// The expectation as a message carrying the sentinel logger name.
    #[must_use]
    pub fn to_message(&self) -> LogMessage {
        LogMessage::new(self.level, self.message.clone()).with_error(self.error.clone())
    }
}

impl From<&str> for Expectation {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Expectation {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

// ---------------------------------------------------------------------------
// LogValidationContext
// ---------------------------------------------------------------------------

/// Captures log records for one test and answers assertions about them.
#[derive(Debug)]
pub struct LogValidationContext {
    buffer: Arc<LogMessageBuffer>,
    scopes: Arc<ScopeStack>,
    replay_cutoff: AtomicUsize,
}

impl Default for LogValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LogValidationContext {
    /// A context with a fresh buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(Arc::new(LogMessageBuffer::new()))
    }

    /// A context storing into an existing buffer.
    #[must_use]
    pub fn with_buffer(buffer: Arc<LogMessageBuffer>) -> Self {
        Self {
            buffer,
            scopes: Arc::new(ScopeStack::new()),
            replay_cutoff: AtomicUsize::new(DEFAULT_REPLAY_CUTOFF),
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &Arc<LogMessageBuffer> {
        &self.buffer
    }

    /// Snapshot of every captured message.
    #[must_use]
    pub fn messages(&self) -> Vec<LogMessage> {
        self.buffer.messages()
    }

    #[must_use]
    pub fn replay_cutoff(&self) -> usize {
        self.replay_cutoff.load(Ordering::Relaxed)
    }

    /// Change how many buffered messages later failures replay.
    pub fn set_replay_cutoff(&self, cutoff: usize) -> &Self {
        self.replay_cutoff.store(cutoff, Ordering::Relaxed);
        self
    }

    // -----------------------------------------------------------------------
    // Capture path
    // -----------------------------------------------------------------------

    /// Record one log call.
    ///
    /// `formatter` renders the text from `state` and `error`. A panicking
    /// formatter is contained; the record is kept with
    /// [`FORMATTER_PANIC_PLACEHOLDER`] as its text.
    pub fn log<S, F>(
        &self,
        name: &str,
        level: LogLevel,
        event_id: Option<EventId>,
        state: &S,
        error: Option<CapturedError>,
        formatter: F,
    ) where
        S: ?Sized,
        F: FnOnce(&S, Option<&CapturedError>) -> String,
    {
        let text = catch_unwind(AssertUnwindSafe(|| formatter(state, error.as_ref())))
            .unwrap_or_else(|_| FORMATTER_PANIC_PLACEHOLDER.to_string());
        self.capture(name, level, event_id, error, text, Vec::new());
    }

    /// Record an already rendered message.
    ///
    /// `extra_properties` come after the context's own scope properties;
    /// adapters use them for scope data they track themselves.
    pub fn log_rendered(
        &self,
        name: &str,
        level: LogLevel,
        event_id: Option<EventId>,
        error: Option<CapturedError>,
        text: String,
        extra_properties: Vec<(String, String)>,
    ) {
        self.capture(name, level, event_id, error, text, extra_properties);
    }

    fn capture(
        &self,
        name: &str,
        level: LogLevel,
        event_id: Option<EventId>,
        error: Option<CapturedError>,
        text: String,
        extra_properties: Vec<(String, String)>,
    ) {
        let mut properties = self.scopes.current_properties();
        properties.extend(extra_properties);
        let message = LogMessage::new(level, text)
            .with_logger_name(name)
            .with_event_id(event_id)
            .with_error(error)
            .with_properties(properties);
        self.buffer.add(message);
    }

    /// Open a scope on the calling thread. Messages logged through this
    /// context on this thread carry its properties until the guard is
    /// dropped.
    ///
    /// In async code, drop the guard before the next `.await`; see
    /// [`crate::scope`].
    #[must_use = "the scope closes as soon as the guard is dropped"]
    pub fn begin_scope(&self, state: impl Into<ScopeState>) -> ScopeGuard {
        self.scopes.push(state.into())
    }

    /// Properties of the calling thread's open scopes, outermost first.
    #[must_use]
    pub fn current_scope_properties(&self) -> Vec<(String, String)> {
        self.scopes.current_properties()
    }

    /// Drop every captured message and open scope.
    pub fn dispose(&self) {
        let count = self.buffer.len();
        self.buffer.clear();
        self.scopes.clear();
        tracing::debug!(discarded = count, "log validation context disposed");
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    /// Assert that a matching message was captured; panics otherwise.
    ///
    /// ```ignore
    /// ctx.received("user created")
    ///    .received(Expectation::new("abc").mode(MatchMode::Exact));
    /// ```
    #[track_caller]
    pub fn received(&self, expectation: impl Into<Expectation>) -> &Self {
        match self.try_received(expectation) {
            Ok(this) => this,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`received`](Self::received), returning the failure instead of
    /// panicking.
    pub fn try_received(
        &self,
        expectation: impl Into<Expectation>,
    ) -> Result<&Self, LogAssertionError> {
        let expectation = expectation.into();
        let comparer = LogMessageComparer::for_mode(expectation.mode);
        let error_msg = format!(
            "Expected log message was not received (comparer: {comparer}, mode: {})",
            expectation.mode
        );
        self.received_expectation(|| expectation.to_message(), &comparer, &error_msg)
    }

    /// Scan the buffer for a message `comparer` considers equal to the
    /// expectation produced by `build`.
    ///
    /// `build` runs at most once.
    pub fn received_expectation<F>(
        &self,
        build: F,
        comparer: &LogMessageComparer,
        error_msg: &str,
    ) -> Result<&Self, LogAssertionError>
    where
        F: FnOnce() -> LogMessage,
    {
        let messages = self.buffer.messages();
        let expected = build();
        let prepared = comparer.prepare(&expected);
        if messages.iter().any(|actual| prepared.matches(actual)) {
            return Ok(self);
        }

        let mut rendered = String::new();
        let _ = writeln!(rendered, "{error_msg}");
        let _ = writeln!(rendered, "Expected: {expected}");
        if let Some(err) = prepared.pattern_error() {
            let _ = writeln!(rendered, "Invalid pattern: {err}");
        }
        let _ = writeln!(rendered, "Received messages:");
        rendered.push_str(&self.render_replay(&messages));
        Err(LogAssertionError::new(rendered))
    }

    /// Assert that no matching message was captured; panics otherwise.
    #[track_caller]
    pub fn not_received(&self, expectation: impl Into<Expectation>) -> &Self {
        match self.try_not_received(expectation) {
            Ok(this) => this,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`not_received`](Self::not_received), returning the failure
    /// instead of panicking.
    pub fn try_not_received(
        &self,
        expectation: impl Into<Expectation>,
    ) -> Result<&Self, LogAssertionError> {
        let expectation = expectation.into();
        let comparer = LogMessageComparer::for_mode(expectation.mode);
        let expected = expectation.to_message();
        let prepared = comparer.prepare(&expected);
        let offending: Vec<LogMessage> = self
            .buffer
            .messages()
            .into_iter()
            .filter(|actual| prepared.matches(actual))
            .collect();
        if offending.is_empty() {
            return Ok(self);
        }

        let mut rendered = String::new();
        let _ = writeln!(
            rendered,
            "Unexpected log message was received (comparer: {comparer}, mode: {})",
            expectation.mode
        );
        let _ = writeln!(rendered, "Not expected: {expected}");
        let _ = writeln!(rendered, "Matching messages:");
        rendered.push_str(&self.render_replay(&offending));
        Err(LogAssertionError::new(rendered))
    }

    fn render_replay(&self, messages: &[LogMessage]) -> String {
        let cutoff = self.replay_cutoff();
        let mut out = String::new();
        if messages.is_empty() {
            let _ = writeln!(out, "  {NO_MESSAGES_MARKER}");
            return out;
        }
        let shown = if messages.len() > cutoff {
            let _ = writeln!(
                out,
                "  ... {} messages received, more than the replay cutoff of {cutoff}; \
                 showing the most recent {cutoff} ...",
                messages.len()
            );
            &messages[messages.len() - cutoff..]
        } else {
            messages
        };
        for message in shown {
            let _ = writeln!(out, "  {message}");
        }
        out
    }
}

impl Drop for LogValidationContext {
    fn drop(&mut self) {
        self.buffer.clear();
    }
}
