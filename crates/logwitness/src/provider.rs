//! Logger provider bound to a validation context
//!
//! [`LoggerProvider`] hands out one [`ContextLogger`] per category name; every
//! logger forwards to the same [`LogValidationContext`]. Loggers never filter:
//! [`ContextLogger::is_enabled`] is always true and assertions decide what
//! matters.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::context::LogValidationContext;
use crate::message::{CapturedError, EventId, LogLevel};
use crate::scope::{ScopeGuard, ScopeState};

/// Creates and caches per-category loggers for one context.
#[derive(Debug)]
pub struct LoggerProvider {
    context: Arc<LogValidationContext>,
    loggers: RwLock<HashMap<String, Arc<ContextLogger>>>,
}

impl LoggerProvider {
    #[must_use]
    pub fn new(context: Arc<LogValidationContext>) -> Self {
        Self {
            context,
            loggers: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<LogValidationContext> {
        &self.context
    }

    /// The logger for `category`, created on first use.
    #[must_use]
    pub fn create_logger(&self, category: &str) -> Arc<ContextLogger> {
        if let Some(logger) = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
        {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(loggers.entry(category.to_string()).or_insert_with(|| {
            Arc::new(ContextLogger {
                category: category.to_string(),
                context: Arc::clone(&self.context),
            })
        }))
    }

    /// Number of distinct categories seen so far.
    #[must_use]
    pub fn logger_count(&self) -> usize {
        self.loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A named logger writing into a validation context.
#[derive(Debug)]
pub struct ContextLogger {
    category: String,
    context: Arc<LogValidationContext>,
}

impl ContextLogger {
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Always true.
    #[must_use]
    pub fn is_enabled(&self, _level: LogLevel) -> bool {
        true
    }

    pub fn log<S, F>(
        &self,
        level: LogLevel,
        event_id: Option<EventId>,
        state: &S,
        error: Option<CapturedError>,
        formatter: F,
    ) where
        S: ?Sized,
        F: FnOnce(&S, Option<&CapturedError>) -> String,
    {
        self.context
            .log(&self.category, level, event_id, state, error, formatter);
    }

    /// Log text that was rendered elsewhere, with properties the caller
    /// tracked itself (appended after the context's scope properties).
    pub fn log_rendered(
        &self,
        level: LogLevel,
        event_id: Option<EventId>,
        error: Option<CapturedError>,
        text: String,
        extra_properties: Vec<(String, String)>,
    ) {
        self.context
            .log_rendered(&self.category, level, event_id, error, text, extra_properties);
    }

    /// Log a plain message with no event id or error.
    pub fn log_message(&self, level: LogLevel, message: &str) {
        self.log(level, None, message, None, |s, _| s.to_string());
    }

    /// Open a scope on the calling thread; see
    /// [`LogValidationContext::begin_scope`].
    #[must_use = "the scope closes as soon as the guard is dropped"]
    pub fn begin_scope(&self, state: impl Into<ScopeState>) -> ScopeGuard {
        self.context.begin_scope(state)
    }
}
