//! Capture configuration
//!
//! Settings are plain serde structs with defaults for every field, so a
//! partial TOML table (or none at all) is valid. Environment variables
//! override file values:
//!
//! | Variable | Field |
//! |---|---|
//! | `LOGWITNESS_REPLAY_CUTOFF` | `replay_cutoff` |
//! | `LOGWITNESS_MIRROR` | `mirror` |
//! | `LOGWITNESS_MIRROR_FORMAT` | `mirror_format` |
//! | `LOGWITNESS_MIRROR_FILTER` | `mirror_filter` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_REPLAY_CUTOFF;
use crate::error::ConfigError;

pub const ENV_REPLAY_CUTOFF: &str = "LOGWITNESS_REPLAY_CUTOFF";
pub const ENV_MIRROR: &str = "LOGWITNESS_MIRROR";
pub const ENV_MIRROR_FORMAT: &str = "LOGWITNESS_MIRROR_FORMAT";
pub const ENV_MIRROR_FILTER: &str = "LOGWITNESS_MIRROR_FILTER";

/// Output format for human-facing log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

/// Per-test capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Messages replayed in assertion failures before truncating.
    pub replay_cutoff: usize,

    /// Also print captured events to the test output.
    pub mirror: bool,

    /// Format of the mirrored output.
    pub mirror_format: LogFormat,

    /// `EnvFilter` directive applied to the mirror only. Capture itself is
    /// never filtered.
    pub mirror_filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            replay_cutoff: DEFAULT_REPLAY_CUTOFF,
            mirror: false,
            mirror_format: LogFormat::Pretty,
            mirror_filter: "trace".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overlay `LOGWITNESS_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay variables looked up through `lookup`.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_REPLAY_CUTOFF) {
            self.replay_cutoff = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_REPLAY_CUTOFF, &value))?;
        }
        if let Some(value) = lookup(ENV_MIRROR) {
            self.mirror = parse_bool(&value).ok_or_else(|| invalid(ENV_MIRROR, &value))?;
        }
        if let Some(value) = lookup(ENV_MIRROR_FORMAT) {
            self.mirror_format = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_MIRROR_FORMAT, &value))?;
        }
        if let Some(value) = lookup(ENV_MIRROR_FILTER) {
            self.mirror_filter = value;
        }
        Ok(self)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
