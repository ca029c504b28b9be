//! Per-test capture fixture
//!
//! [`LogCapture`] owns one fresh [`LogValidationContext`] and installs a
//! [`CaptureLayer`] as the calling thread's default `tracing` subscriber.
//! Dropping it clears the buffer and restores the previous subscriber.
//!
//! ```ignore
//! #[test]
//! fn reports_retry() {
//!     let logs = LogCapture::start();
//!     client.fetch_with_retry();
//!     logs.received(Expectation::new("retrying").level(LogLevel::Warning));
//! }
//! ```
//!
//! The subscriber is thread-local. Code that logs from other threads should
//! be given [`LogCapture::provider`] or [`LogCapture::context`] explicitly,
//! or install its own [`CaptureLayer`] built from [`LogCapture::context`].

use std::ops::Deref;
use std::sync::Arc;

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::prelude::*;

use crate::config::CaptureConfig;
use crate::context::LogValidationContext;
use crate::error::Result;
use crate::layer::CaptureLayer;
use crate::logging::mirror_layer;
use crate::provider::LoggerProvider;

/// A validation context wired into `tracing` for the current test.
pub struct LogCapture {
    context: Arc<LogValidationContext>,
    _guard: DefaultGuard,
}

impl LogCapture {
    /// Capture with default settings and no mirror.
    #[must_use]
    pub fn start() -> Self {
        let context = Arc::new(LogValidationContext::new());
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(Arc::clone(&context)));
        let guard = tracing::subscriber::set_default(subscriber);
        tracing::debug!("log capture started");
        Self {
            context,
            _guard: guard,
        }
    }

    /// Capture with settings taken from `LOGWITNESS_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(&CaptureConfig::from_env()?)
    }

    /// Capture with explicit settings.
    pub fn with_config(config: &CaptureConfig) -> Result<Self> {
        let context = Arc::new(LogValidationContext::new());
        context.set_replay_cutoff(config.replay_cutoff);

        let base = tracing_subscriber::registry().with(CaptureLayer::new(Arc::clone(&context)));
        let mirror = mirror_layer::<Layered<CaptureLayer, Registry>>(config)?;
        let guard = tracing::subscriber::set_default(base.with(mirror));
        tracing::debug!(
            replay_cutoff = config.replay_cutoff,
            mirror = config.mirror,
            "log capture started"
        );
        Ok(Self {
            context,
            _guard: guard,
        })
    }

    #[must_use]
    pub fn context(&self) -> &Arc<LogValidationContext> {
        &self.context
    }

    /// A provider bound to this capture's context.
    #[must_use]
    pub fn provider(&self) -> LoggerProvider {
        LoggerProvider::new(Arc::clone(&self.context))
    }
}

impl Deref for LogCapture {
    type Target = LogValidationContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl std::fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCapture")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        self.context.dispose();
    }
}
