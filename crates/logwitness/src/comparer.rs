//! Matching strategies between a captured message and an expectation
//!
//! A [`LogMessageComparer`] decides whether an actual [`LogMessage`] satisfies
//! an expected one. Every comparer checks three things:
//!
//! 1. the levels are identical,
//! 2. the message text satisfies the comparer's [`MatchMode`], ignoring case,
//! 3. the errors are equal (both absent, or same kind and same message
//!    ignoring case).
//!
//! In [`MatchMode::Regex`] the *expected* message is the pattern and the
//! actual message is searched. The other modes treat the expected message as
//! a literal probe.
//!
//! Only [`LogMessageComparer::DEFAULT`] has a matching hash
//! ([`LogMessageComparer::hash_message`]); the looser modes are meant for
//! linear scans.

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::message::{CapturedError, LogMessage};

/// How the expected message text is compared with the actual text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Whole text equal, ignoring case.
    Exact,
    /// Actual text contains the expected text.
    #[default]
    Contains,
    /// Actual text starts with the expected text.
    Start,
    /// Actual text ends with the expected text.
    End,
    /// Expected text is a case-insensitive regex searched in the actual text.
    Regex,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Start => "start",
            Self::End => "end",
            Self::Regex => "regex",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" | "default" => Ok(Self::Exact),
            "contains" => Ok(Self::Contains),
            "start" | "starts_with" => Ok(Self::Start),
            "end" | "ends_with" => Ok(Self::End),
            "regex" => Ok(Self::Regex),
            _ => Err(format!(
                "unknown match mode: {s}. Expected one of: exact, contains, start, end, regex"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// LogMessageComparer
// ---------------------------------------------------------------------------

/// Named equality strategy over two log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMessageComparer {
    name: &'static str,
    mode: MatchMode,
}

impl LogMessageComparer {
    pub const DEFAULT: Self = Self {
        name: "Default",
        mode: MatchMode::Exact,
    };
    pub const CONTAINS: Self = Self {
        name: "Contains",
        mode: MatchMode::Contains,
    };
    pub const START: Self = Self {
        name: "Start",
        mode: MatchMode::Start,
    };
    pub const END: Self = Self {
        name: "End",
        mode: MatchMode::End,
    };
    pub const REGEX: Self = Self {
        name: "Regex",
        mode: MatchMode::Regex,
    };

    /// The comparer used for `mode`.
    #[must_use]
    pub const fn for_mode(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Exact => Self::DEFAULT,
            MatchMode::Contains => Self::CONTAINS,
            MatchMode::Start => Self::START,
            MatchMode::End => Self::END,
            MatchMode::Regex => Self::REGEX,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Does `actual` satisfy `expected`?
    ///
    /// Compiles the pattern on every call in regex mode; use [`prepare`]
    /// when scanning many messages.
    ///
    /// [`prepare`]: Self::prepare
    #[must_use]
    pub fn equals(&self, actual: &LogMessage, expected: &LogMessage) -> bool {
        self.prepare(expected).matches(actual)
    }

    /// Precompute everything derived from `expected` once.
    #[must_use]
    pub fn prepare<'a>(&self, expected: &'a LogMessage) -> PreparedMatch<'a> {
        let probe = match self.mode {
            MatchMode::Regex => Probe::Pattern(
                RegexBuilder::new(expected.message())
                    .case_insensitive(true)
                    .build(),
            ),
            mode => Probe::Literal {
                mode,
                lowered: expected.message().to_lowercase(),
            },
        };
        PreparedMatch { expected, probe }
    }

    /// Check that `expected` can be used with this comparer.
    ///
    /// Only regex mode can fail, when the pattern does not compile.
    pub fn validate(&self, expected: &LogMessage) -> Result<(), regex::Error> {
        if self.mode == MatchMode::Regex {
            RegexBuilder::new(expected.message())
                .case_insensitive(true)
                .build()?;
        }
        Ok(())
    }

    /// Hash consistent with [`LogMessageComparer::DEFAULT`] equality.
    pub fn hash_message<H: Hasher>(message: &LogMessage, state: &mut H) {
        message.level().hash(state);
        message.message().to_lowercase().hash(state);
        match message.error() {
            // Kind is not hashed: an unknown kind compares equal to any kind.
            Some(error) => {
                1u8.hash(state);
                error.message().to_lowercase().hash(state);
            }
            None => 0u8.hash(state),
        }
    }
}

impl Default for LogMessageComparer {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LogMessageComparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Error equality: both absent, or same kind and message ignoring case.
///
/// A missing kind (an error captured as `&dyn Error`) is compatible with any
/// kind.
#[must_use]
pub fn errors_equal(actual: Option<&CapturedError>, expected: Option<&CapturedError>) -> bool {
    match (actual, expected) {
        (None, None) => true,
        (Some(a), Some(e)) => {
            let kinds_match = match (a.kind(), e.kind()) {
                (Some(ak), Some(ek)) => ak == ek,
                _ => true,
            };
            kinds_match && a.message().to_lowercase() == e.message().to_lowercase()
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// PreparedMatch
// ---------------------------------------------------------------------------

enum Probe {
    Literal { mode: MatchMode, lowered: String },
    Pattern(Result<Regex, regex::Error>),
}

/// An expectation with its probe text lowered or its pattern compiled.
pub struct PreparedMatch<'a> {
    expected: &'a LogMessage,
    probe: Probe,
}

impl PreparedMatch<'_> {
    #[must_use]
    pub fn matches(&self, actual: &LogMessage) -> bool {
        actual.level() == self.expected.level()
            && self.text_matches(actual.message())
            && errors_equal(actual.error(), self.expected.error())
    }

    /// The pattern compile error, when the expectation is an invalid regex.
    #[must_use]
    pub fn pattern_error(&self) -> Option<&regex::Error> {
        match &self.probe {
            Probe::Pattern(Err(err)) => Some(err),
            _ => None,
        }
    }

    fn text_matches(&self, actual: &str) -> bool {
        match &self.probe {
            Probe::Literal { mode, lowered } => {
                let actual = actual.to_lowercase();
                match mode {
                    MatchMode::Exact => actual == *lowered,
                    MatchMode::Contains => actual.contains(lowered.as_str()),
                    MatchMode::Start => actual.starts_with(lowered.as_str()),
                    MatchMode::End => actual.ends_with(lowered.as_str()),
                    MatchMode::Regex => false,
                }
            }
            Probe::Pattern(Ok(re)) => re.is_match(actual),
            Probe::Pattern(Err(_)) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// DefaultKey
// ---------------------------------------------------------------------------

/// Wraps a message so it can be used as a hash key under default equality.
///
/// Unlike [`LogMessageComparer::DEFAULT`], error kinds compare strictly here:
/// an untyped error only equals another untyped error. The lenient rule is
/// not transitive and would break `Eq`.
#[derive(Debug, Clone)]
pub struct DefaultKey(pub LogMessage);

impl PartialEq for DefaultKey {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.0, &other.0);
        let errors_match = match (a.error(), b.error()) {
            (None, None) => true,
            (Some(ae), Some(be)) => {
                ae.kind() == be.kind()
                    && ae.message().to_lowercase() == be.message().to_lowercase()
            }
            _ => false,
        };
        a.level() == b.level()
            && a.message().to_lowercase() == b.message().to_lowercase()
            && errors_match
    }
}

impl Eq for DefaultKey {}

impl Hash for DefaultKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        LogMessageComparer::hash_message(&self.0, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LogLevel;
    use std::collections::HashSet;

    fn info(text: &str) -> LogMessage {
        LogMessage::new(LogLevel::Information, text).with_logger_name("test")
    }

    #[test]
    fn for_mode_selects_named_comparer() {
        assert_eq!(LogMessageComparer::for_mode(MatchMode::Exact).name(), "Default");
        assert_eq!(LogMessageComparer::for_mode(MatchMode::Contains).name(), "Contains");
        assert_eq!(LogMessageComparer::for_mode(MatchMode::Start).name(), "Start");
        assert_eq!(LogMessageComparer::for_mode(MatchMode::End).name(), "End");
        assert_eq!(LogMessageComparer::for_mode(MatchMode::Regex).name(), "Regex");
    }

    #[test]
    fn exact_is_case_insensitive_whole_text() {
        let expected = info("abc");
        let cmp = LogMessageComparer::DEFAULT;
        assert!(cmp.equals(&info("abc"), &expected));
        assert!(cmp.equals(&info("ABC"), &expected));
        assert!(!cmp.equals(&info("ABCD"), &expected));
    }

    #[test]
    fn contains_start_end() {
        let actual = info("Request Completed In 12ms");
        assert!(LogMessageComparer::CONTAINS.equals(&actual, &info("completed")));
        assert!(LogMessageComparer::START.equals(&actual, &info("request")));
        assert!(!LogMessageComparer::START.equals(&actual, &info("completed")));
        assert!(LogMessageComparer::END.equals(&actual, &info("12MS")));
        assert!(!LogMessageComparer::END.equals(&actual, &info("request")));
    }

    #[test]
    fn regex_uses_expected_as_pattern() {
        let actual = info("Call 555-1234 now");
        assert!(LogMessageComparer::REGEX.equals(&actual, &info(r"\d{3}-\d{4}")));
        // Asymmetric: the actual text is not treated as a pattern.
        assert!(!LogMessageComparer::REGEX.equals(&info(r"\d{3}-\d{4}"), &actual));
    }

    #[test]
    fn regex_is_case_insensitive() {
        assert!(LogMessageComparer::REGEX.equals(&info("USER LOGGED IN"), &info("^user .* in$")));
    }

    #[test]
    fn invalid_regex_never_matches() {
        let expected = info("([unclosed");
        let prepared = LogMessageComparer::REGEX.prepare(&expected);
        assert!(prepared.pattern_error().is_some());
        assert!(!prepared.matches(&info("([unclosed")));
        assert!(LogMessageComparer::REGEX.validate(&expected).is_err());
        assert!(LogMessageComparer::CONTAINS.validate(&expected).is_ok());
    }

    #[test]
    fn level_must_match_exactly() {
        let actual = LogMessage::new(LogLevel::Warning, "this has foo in it");
        assert!(!LogMessageComparer::CONTAINS.equals(&actual, &info("foo")));
        let expected = LogMessage::new(LogLevel::Warning, "foo");
        assert!(LogMessageComparer::CONTAINS.equals(&actual, &expected));
    }

    #[test]
    fn errors_compare_by_kind_and_message() {
        let with = |err: Option<CapturedError>| info("x").with_error(err);
        let io = CapturedError::new("IoError", "Broken Pipe");
        let cmp = LogMessageComparer::DEFAULT;

        assert!(cmp.equals(&with(None), &with(None)));
        assert!(cmp.equals(
            &with(Some(io.clone())),
            &with(Some(CapturedError::new("IoError", "broken pipe")))
        ));
        assert!(!cmp.equals(
            &with(Some(io.clone())),
            &with(Some(CapturedError::new("ParseError", "broken pipe")))
        ));
        assert!(!cmp.equals(
            &with(Some(io.clone())),
            &with(Some(CapturedError::new("IoError", "reset")))
        ));
        assert!(!cmp.equals(&with(Some(io.clone())), &with(None)));
        assert!(!cmp.equals(&with(None), &with(Some(io))));
    }

    #[test]
    fn untyped_error_matches_any_kind() {
        assert!(errors_equal(
            Some(&CapturedError::untyped("timeout")),
            Some(&CapturedError::new("TimeoutError", "TIMEOUT")),
        ));
    }

    #[test]
    fn default_key_dedups_case_insensitively() {
        let mut set = HashSet::new();
        set.insert(DefaultKey(info("Hello")));
        set.insert(DefaultKey(info("hello")));
        set.insert(DefaultKey(info("HELLO")));
        set.insert(DefaultKey(LogMessage::new(LogLevel::Error, "hello")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn default_key_kinds_are_strict() {
        let with = |err: CapturedError| DefaultKey(info("failed").with_error(Some(err)));
        let untyped = with(CapturedError::untyped("timeout"));
        let kind_a = with(CapturedError::new("A", "timeout"));
        let kind_b = with(CapturedError::new("B", "TIMEOUT"));

        assert_ne!(untyped, kind_a);
        assert_ne!(untyped, kind_b);
        assert_ne!(kind_a, kind_b);
        assert_eq!(kind_a, with(CapturedError::new("A", "TIMEOUT")));

        let set: HashSet<DefaultKey> = [untyped, kind_a, kind_b].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn match_mode_parse_and_display() {
        for mode in [
            MatchMode::Exact,
            MatchMode::Contains,
            MatchMode::Start,
            MatchMode::End,
            MatchMode::Regex,
        ] {
            assert_eq!(mode.to_string().parse::<MatchMode>().unwrap(), mode);
        }
        assert_eq!("Default".parse::<MatchMode>().unwrap(), MatchMode::Exact);
        assert!("fuzzy".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::default(), MatchMode::Contains);
    }
}
