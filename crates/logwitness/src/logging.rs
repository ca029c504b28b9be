//! Diagnostics logging for logwitness
//!
//! Two unrelated things live here:
//!
//! - [`init_logging`] installs a process-wide `tracing` subscriber for tools
//!   built on this crate, in pretty or JSON format.
//! - [`mirror_layer`] builds the optional `fmt` layer a
//!   [`LogCapture`](crate::fixture::LogCapture) stacks next to its capture
//!   layer, so captured events also show up in the test output.
//!
//! The crate's own events use targets under `logwitness::` and are never
//! captured by [`CaptureLayer`](crate::layer::CaptureLayer).

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub use crate::config::LogFormat;
use crate::config::CaptureConfig;
use crate::error::ConfigError;

static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Global diagnostics logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` string). `RUST_LOG` overrides it.
    pub level: String,

    /// Output format (pretty or json)
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global stderr subscriber.
///
/// Subsequent calls return `Err(LogError::AlreadyInitialized)`.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|_| LogError::InvalidLevel(config.level.clone()))?,
    };

    match config.format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let _ = LOGGING_INITIALIZED.set(true);

    tracing::info!(
        log_level = %config.level,
        log_format = %config.format,
        "Logging initialized"
    );

    Ok(())
}

/// Check if logging has been initialized
pub fn is_logging_initialized() -> bool {
    LOGGING_INITIALIZED.get().is_some()
}

/// The test-output mirror described by `config`, or `None` when mirroring
/// is off.
pub fn mirror_layer<S>(
    config: &CaptureConfig,
) -> Result<Option<Box<dyn Layer<S> + Send + Sync + 'static>>, ConfigError>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    if !config.mirror {
        return Ok(None);
    }

    let filter =
        EnvFilter::try_new(&config.mirror_filter).map_err(|_| ConfigError::InvalidValue {
            key: "mirror_filter".to_string(),
            value: config.mirror_filter.clone(),
        })?;

    let layer = match config.mirror_format {
        LogFormat::Pretty => fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(SystemTime)
            .with_test_writer()
            .with_target(true)
            .with_current_span(true)
            .flatten_event(true)
            .with_filter(filter)
            .boxed(),
    };
    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn log_config_serde_defaults_from_empty_json() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn log_config_serde_partial_fields() {
        let config: LogConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn log_error_display() {
        assert_eq!(
            LogError::AlreadyInitialized.to_string(),
            "logging already initialized"
        );
        assert_eq!(
            LogError::InvalidLevel("verbose".to_string()).to_string(),
            "invalid log level: verbose"
        );
    }

    #[test]
    fn mirror_disabled_builds_nothing() {
        let layer = mirror_layer::<Registry>(&CaptureConfig::default()).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn mirror_enabled_builds_layer() {
        for format in [LogFormat::Pretty, LogFormat::Json] {
            let config = CaptureConfig {
                mirror: true,
                mirror_format: format,
                ..CaptureConfig::default()
            };
            assert!(mirror_layer::<Registry>(&config).unwrap().is_some());
        }
    }

    #[test]
    fn mirror_rejects_bad_filter() {
        let config = CaptureConfig {
            mirror: true,
            mirror_filter: "app=notalevel".to_string(),
            ..CaptureConfig::default()
        };
        let err = mirror_layer::<Registry>(&config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "mirror_filter"));
    }

    // init_logging installs a process-wide subscriber; see
    // tests/logging_init.rs.
}
