//! Tracing layer that forwards log events to a debug view.
//!
//! Events are copied into [`DiagnosticEvent`] values and sent over an
//! unbounded channel. The `instance` field that the session manager attaches
//! to every line is lifted out so a view can group lines per manager.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// One captured log event.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    /// Event target, e.g. `revere_application::auth::manager`
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    pub message: String,
    /// Session manager instance that emitted the event, if any.
    pub instance: Option<String>,
    /// Structured fields, excluding `message` and `instance`.
    pub fields: HashMap<String, Value>,
    /// Fields of the innermost enclosing span.
    pub span: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Fields recorded on span creation, stored in the span's extensions.
struct SpanFields(HashMap<String, Value>);

/// A tracing layer that sends events at or above `min_level` to a channel.
pub struct DiagnosticEventLayer {
    sender: mpsc::UnboundedSender<DiagnosticEvent>,
    min_level: Level,
}

impl DiagnosticEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<DiagnosticEvent>) -> Self {
        Self {
            sender,
            min_level: Level::DEBUG,
        }
    }

    /// Creates a layer together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DiagnosticEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl<S> Layer<S> for DiagnosticEventLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // Level ordering: TRACE > DEBUG > INFO > WARN > ERROR
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let span = ctx
            .event_span(event)
            .and_then(|span| {
                span.extensions()
                    .get::<SpanFields>()
                    .map(|stored| stored.0.clone())
            })
            .unwrap_or_default();

        let message = match fields.remove("message") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let instance = fields.remove("instance").map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });

        let diagnostic = DiagnosticEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message,
            instance,
            fields,
            span,
            timestamp: Utc::now(),
        };

        // Receiver gone means nobody is watching.
        let _ = self.sender.send(diagnostic);
    }
}

/// Field visitor that extracts tracing fields into a HashMap
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}
