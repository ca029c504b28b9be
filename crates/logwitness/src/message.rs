//! Captured log records
//!
//! A [`LogMessage`] is one log event as the engine stored it, or an
//! expectation written by a test. Both use the same type; expectations carry
//! the [`EXPECTATION_LOGGER_NAME`] sentinel as their logger name.
//!
//! `LogMessage` intentionally has no `PartialEq`. Two messages are "equal"
//! only under a [`LogMessageComparer`](crate::comparer::LogMessageComparer).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Logger name given to messages built by test code rather than captured.
pub const EXPECTATION_LOGGER_NAME: &str = "LogValidationContext.Expectation";

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Information
    }
}

impl LogLevel {
    /// All levels, least to most severe.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Information,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "information" | "info" => Ok(Self::Information),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            _ => Err(format!(
                "unknown log level: {s}. Expected one of: trace, debug, information, warning, error, critical"
            )),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Information,
            tracing::Level::WARN => Self::Warning,
            _ => Self::Error,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Information => Self::INFO,
            LogLevel::Warning => Self::WARN,
            LogLevel::Error | LogLevel::Critical => Self::ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// CapturedError
// ---------------------------------------------------------------------------

/// An error attached to a log record, reduced to its kind and message.
///
/// `kind` is the Rust type name when the concrete type was known at capture
/// time. Errors that arrive as `&dyn Error` (for example through a
/// `tracing` field) have no kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    message: String,
}

impl CapturedError {
    /// Create an error value with an explicit kind.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: message.into(),
        }
    }

    /// Create an error value whose kind is unknown.
    #[must_use]
    pub fn untyped(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    /// Capture a concrete error; the kind is `E`'s type name.
    ///
    /// Trait objects have no useful type name; use
    /// [`from_dyn`](Self::from_dyn) for them.
    ///
    /// ```compile_fail
    /// let err: Box<dyn std::error::Error> = "boom".into();
    /// let _ = logwitness::CapturedError::of(err.as_ref());
    /// ```
    #[must_use]
    pub fn of<E: std::error::Error>(err: &E) -> Self {
        Self {
            kind: Some(std::any::type_name::<E>().to_string()),
            message: err.to_string(),
        }
    }

    /// Capture an error known only as a trait object. The kind is unknown,
    /// so it compares equal to any kind with the same message.
    #[must_use]
    pub fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::untyped(err.to_string())
    }

    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// Numeric identifier of a log call site, with an optional name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventId {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EventId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self { id, name: None }
    }

    #[must_use]
    pub fn named(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{name}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// LogMessage
// ---------------------------------------------------------------------------

/// One captured log record, or one expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    level: LogLevel,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CapturedError>,
    timestamp: DateTime<Utc>,
    logger_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    properties: Vec<(String, String)>,
}

impl LogMessage {
    /// Build an expectation-style message: sentinel logger name, current time,
    /// no properties.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            error: None,
            timestamp: Utc::now(),
            logger_name: EXPECTATION_LOGGER_NAME.to_string(),
            event_id: None,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<CapturedError>) -> Self {
        self.error = error;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_logger_name(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = logger_name.into();
        self
    }

    #[must_use]
    pub fn with_event_id(mut self, event_id: Option<EventId>) -> Self {
        self.event_id = event_id;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Vec<(String, String)>) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Fully rendered message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    /// Event id passed by the logging call, if any. Not used for matching.
    #[must_use]
    pub fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    /// Scope properties, outermost scope first.
    #[must_use]
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Value of the innermost property named `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when this message was authored by a test, not captured.
    #[must_use]
    pub fn is_expectation(&self) -> bool {
        self.logger_name == EXPECTATION_LOGGER_NAME
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.logger_name,
            self.message
        )?;
        if let Some(error) = &self.error {
            write!(f, "|{error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn new_message_is_expectation() {
        let msg = LogMessage::new(LogLevel::Warning, "hello");
        assert!(msg.is_expectation());
        assert_eq!(msg.logger_name(), EXPECTATION_LOGGER_NAME);
        assert_eq!(msg.level(), LogLevel::Warning);
        assert_eq!(msg.message(), "hello");
        assert!(msg.error().is_none());
        assert!(msg.properties().is_empty());
    }

    #[test]
    fn captured_message_is_not_expectation() {
        let msg = LogMessage::new(LogLevel::Information, "x").with_logger_name("app::db");
        assert!(!msg.is_expectation());
    }

    #[test]
    fn display_without_error() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let msg = LogMessage::new(LogLevel::Information, "started")
            .with_timestamp(ts)
            .with_logger_name("svc");
        assert_eq!(
            msg.to_string(),
            "2024-03-01T12:30:00.000Z | Information | svc | started"
        );
    }

    #[test]
    fn display_with_error() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let msg = LogMessage::new(LogLevel::Error, "failed")
            .with_timestamp(ts)
            .with_logger_name("svc")
            .with_error(Some(CapturedError::new("IoError", "broken pipe")));
        assert_eq!(
            msg.to_string(),
            "2024-03-01T12:30:00.000Z | Error | svc | failed|IoError: broken pipe"
        );
    }

    #[test]
    fn property_returns_innermost() {
        let msg = LogMessage::new(LogLevel::Debug, "x").with_properties(vec![
            ("id".to_string(), "outer".to_string()),
            ("other".to_string(), "1".to_string()),
            ("id".to_string(), "inner".to_string()),
        ]);
        assert_eq!(msg.property("id"), Some("inner"));
        assert_eq!(msg.property("other"), Some("1"));
        assert_eq!(msg.property("missing"), None);
    }

    #[test]
    fn captured_error_of_uses_type_name() {
        let err = CapturedError::of(&DiskError);
        assert!(err.kind().unwrap().ends_with("DiskError"));
        assert_eq!(err.message(), "disk on fire");
    }

    #[test]
    fn boxed_error_is_captured_untyped() {
        let boxed: Box<dyn std::error::Error> = Box::new(DiskError);
        let err = CapturedError::from_dyn(boxed.as_ref());
        assert_eq!(err.kind(), None);
        assert_eq!(err.message(), "disk on fire");
        assert!(crate::comparer::errors_equal(
            Some(&err),
            Some(&CapturedError::of(&DiskError)),
        ));
    }

    #[test]
    fn untyped_error_displays_message_only() {
        let err = CapturedError::untyped("boom");
        assert_eq!(err.kind(), None);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn event_id_display() {
        assert_eq!(EventId::new(7).to_string(), "7");
        assert_eq!(EventId::named(12, "UserCreated").to_string(), "12:UserCreated");
    }

    #[test]
    fn log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Information);
        assert_eq!("Information".parse::<LogLevel>().unwrap(), LogLevel::Information);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("fatal".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert!(err.contains("unknown log level: verbose"));
    }

    #[test]
    fn log_level_default_is_information() {
        assert_eq!(LogLevel::default(), LogLevel::Information);
    }

    #[test]
    fn log_level_ordering() {
        for pair in LogLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn tracing_level_conversion() {
        assert_eq!(LogLevel::from(tracing::Level::TRACE), LogLevel::Trace);
        assert_eq!(LogLevel::from(tracing::Level::DEBUG), LogLevel::Debug);
        assert_eq!(LogLevel::from(tracing::Level::INFO), LogLevel::Information);
        assert_eq!(LogLevel::from(tracing::Level::WARN), LogLevel::Warning);
        assert_eq!(LogLevel::from(tracing::Level::ERROR), LogLevel::Error);
        assert_eq!(tracing::Level::from(LogLevel::Critical), tracing::Level::ERROR);
    }

    #[test]
    fn serde_roundtrip_preserves_fields() {
        let msg = LogMessage::new(LogLevel::Error, "oops")
            .with_logger_name("svc")
            .with_error(Some(CapturedError::untyped("inner")))
            .with_event_id(Some(EventId::named(3, "Boot")))
            .with_properties(vec![("k".to_string(), "v".to_string())]);
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: LogMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.level(), LogLevel::Error);
        assert_eq!(parsed.message(), "oops");
        assert_eq!(parsed.logger_name(), "svc");
        assert_eq!(parsed.error(), msg.error());
        assert_eq!(parsed.event_id(), msg.event_id());
        assert_eq!(parsed.properties(), msg.properties());
        assert_eq!(parsed.timestamp(), msg.timestamp());
    }
}
