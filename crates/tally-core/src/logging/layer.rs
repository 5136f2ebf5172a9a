//! JSONL output layer.
//!
//! One JSON object per event on the configured writer:
//! `{ts, level, event, run_id?, stage?, config_hash?, message?, fields?}`.
//! `event` is the tracing target, which [`log_event!`](crate::log_event) sets
//! to a stable name from `event_names`. Fields recorded on enclosing stage
//! spans are inherited, innermost span first, and the event's own fields win.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Keys lifted out of `fields` to the top level of each line.
const CORRELATION_KEYS: [&str; 3] = ["run_id", "stage", "config_hash"];

/// Fields recorded on a span, stored in its extensions.
#[derive(Debug, Default)]
struct SpanFields(Map<String, Value>);

/// Collects tracing fields into a JSON map.
#[derive(Default)]
struct FieldCollector(Map<String, Value>);

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

/// Writes each event as one JSON line. Stderr unless built with [`JsonlLayer::new`].
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

/// Assemble one output line from inherited span fields and the event's own.
fn render_line(
    level: Level,
    event_name: &str,
    mut fields: Map<String, Value>,
) -> Map<String, Value> {
    let mut line = Map::new();
    line.insert("ts".into(), Value::from(Utc::now().to_rfc3339()));
    line.insert("level".into(), serde_json::json!(level));
    line.insert("event".into(), Value::from(event_name));
    for key in CORRELATION_KEYS {
        if let Some(value) = fields.remove(key) {
            line.insert(key.into(), value);
        }
    }
    if let Some(message) = fields.remove("message") {
        line.insert("message".into(), message);
    }
    if !fields.is_empty() {
        line.insert("fields".into(), Value::Object(fields));
    }
    line
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        attrs.record(&mut collector);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(collector.0));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Map::new();
        if let Some(scope) = ctx.event_scope(event) {
            // Root first so inner spans overwrite outer ones
            for span in scope.from_root() {
                if let Some(SpanFields(span_fields)) = span.extensions().get::<SpanFields>() {
                    fields.extend(span_fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        let mut own = FieldCollector::default();
        event.record(&mut own);
        fields.extend(own.0);

        let metadata = event.metadata();
        let line = render_line((*metadata.level()).into(), metadata.target(), fields);
        let Ok(json) = serde_json::to_string(&Value::Object(line)) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{json}");
        }
    }
}
