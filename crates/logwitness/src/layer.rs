//! `tracing` adapter
//!
//! [`CaptureLayer`] turns `tracing` events into captured messages:
//!
//! - the event target is the logger category,
//! - the `message` field is the text,
//! - an `event_id` integer field becomes the message's [`EventId`],
//! - an error recorded with `error = &err as &dyn Error` becomes the
//!   message's error (without a kind),
//! - span fields are scope properties, root span first, followed by the
//!   event's own remaining fields.
//!
//! Events emitted by this crate (target `logwitness*`) are never captured.

use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use crate::context::LogValidationContext;
use crate::message::{CapturedError, EventId, LogLevel};
use crate::provider::LoggerProvider;
use crate::scope::ScopeState;

const SELF_TARGET: &str = "logwitness";

/// Span extension holding the span's fields as scope properties.
#[derive(Debug, Clone, Default)]
struct SpanScope(Vec<(String, String)>);

/// Forwards `tracing` events and spans into a [`LogValidationContext`].
#[derive(Debug)]
pub struct CaptureLayer {
    provider: LoggerProvider,
}

impl CaptureLayer {
    #[must_use]
    pub fn new(context: Arc<LogValidationContext>) -> Self {
        Self {
            provider: LoggerProvider::new(context),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &LoggerProvider {
        &self.provider
    }
}

fn is_self_target(target: &str) -> bool {
    target
        .strip_prefix(SELF_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = PropertyVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut()
            .insert(SpanScope(visitor.into_scope_properties()));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = PropertyVisitor::default();
        values.record(&mut visitor);
        let recorded = visitor.into_scope_properties();

        let mut extensions = span.extensions_mut();
        if let Some(scope) = extensions.get_mut::<SpanScope>() {
            for (key, value) in recorded {
                match scope.0.iter_mut().find(|(k, _)| *k == key) {
                    Some(existing) => existing.1 = value,
                    None => scope.0.push((key, value)),
                }
            }
        } else {
            extensions.insert(SpanScope(recorded));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_self_target(metadata.target()) {
            return;
        }

        let mut visitor = PropertyVisitor::default();
        event.record(&mut visitor);

        let mut properties = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(span_scope) = span.extensions().get::<SpanScope>() {
                    properties.extend(span_scope.0.iter().cloned());
                }
            }
        }
        properties.extend(visitor.properties);

        self.provider.create_logger(metadata.target()).log_rendered(
            LogLevel::from(*metadata.level()),
            visitor.event_id,
            visitor.error,
            visitor.message.unwrap_or_default(),
            properties,
        );
    }
}

// ---------------------------------------------------------------------------
// Field visitor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PropertyVisitor {
    message: Option<String>,
    event_id: Option<EventId>,
    error: Option<CapturedError>,
    properties: Vec<(String, String)>,
}

impl PropertyVisitor {
    /// Span fields as properties. A span's `message` field is stored under
    /// the single-value scope key.
    fn into_scope_properties(self) -> Vec<(String, String)> {
        let mut properties = Vec::new();
        if let Some(message) = self.message {
            properties.extend(ScopeState::from(message).into_properties());
        }
        properties.extend(self.properties);
        properties
    }

    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.properties.push((field.name().to_string(), value));
        }
    }

    fn push_id(&mut self, field: &Field, id: i64) -> bool {
        if field.name() == "event_id" && self.event_id.is_none() {
            self.event_id = Some(EventId::new(id));
            return true;
        }
        false
    }
}

impl Visit for PropertyVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if !self.push_id(field, value) {
            self.push(field, value.to_string());
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let handled = i64::try_from(value).is_ok_and(|id| self.push_id(field, id));
        if !handled {
            self.push(field, value.to_string());
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.error.is_none() {
            self.error = Some(CapturedError::from_dyn(value));
        } else {
            self.push(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}
