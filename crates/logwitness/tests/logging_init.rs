//! Global diagnostics subscriber. Lives in its own test binary because
//! `init_logging` installs a process-wide default.

use logwitness::logging::{LogConfig, LogError, LogFormat, init_logging, is_logging_initialized};
use logwitness::{LogCapture, LogLevel};

#[test]
fn init_once_then_capture_still_works() {
    let config = LogConfig {
        level: "warn".to_string(),
        format: LogFormat::Json,
    };
    init_logging(&config).unwrap();
    assert!(is_logging_initialized());
    assert!(matches!(
        init_logging(&LogConfig::default()),
        Err(LogError::AlreadyInitialized)
    ));

    // The capture subscriber is the thread default and sees everything,
    // regardless of the global filter.
    let logs = LogCapture::start();
    tracing::debug!("visible to the capture only");
    logs.received(logwitness::Expectation::new("visible to the capture").level(LogLevel::Debug));
}
