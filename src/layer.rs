use crate::handler::{BoxWriter, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::{Attr, Value};
use chrono::Utc;
use std::io::Write;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanRecord};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::{LookupSpan, SpanRef};

/// `tracing_subscriber` layer that writes every event as one JSON line
/// through a [`Handler`].
///
/// Spans map onto handler derivations: a new span derives its handler from
/// the parent span's (or the root), opening a group named after the span
/// when span groups are enabled and adding the span's fields. Events are
/// emitted through the handler of the span they occur in, with the
/// current OpenTelemetry context supplying `trace_id`/`span_id`.
pub struct JsonLayer<W = BoxWriter> {
    handler: Handler<W>,
    span_groups: bool,
    /// Events seen by the layer, before level filtering.
    pub total_events: Arc<AtomicU64>,
    /// Events whose line could not be written.
    pub failed_events: Arc<AtomicU64>,
}

/// Handler derived for a span, kept in the span's extensions.
struct SpanHandler<W>(Handler<W>);

impl<W: Write + Send + 'static> JsonLayer<W> {
    pub fn new(handler: Handler<W>) -> Self {
        JsonLayer {
            handler,
            span_groups: true,
            total_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether span names open a group around the span's fields and
    /// everything logged inside the span. When disabled, span fields are
    /// added at the level of the enclosing span.
    pub fn with_span_groups(mut self, enabled: bool) -> Self {
        self.span_groups = enabled;
        self
    }

    fn span_handler<S>(&self, span: Option<SpanRef<'_, S>>) -> Handler<W>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        if let Some(span) = span {
            let extensions = span.extensions();
            if let Some(scoped) = extensions.get::<SpanHandler<W>>() {
                return scoped.0.clone();
            }
        }
        self.handler.clone()
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: Write + Send + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = Vec::new();
        attrs.record(&mut FieldVisitor { fields: &mut fields, message: None });

        let mut handler = self.span_handler(span.parent());
        if self.span_groups {
            handler = handler.with_group(span.name());
        }
        handler = handler.with_attrs(&fields);

        span.extensions_mut().insert(SpanHandler(handler));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = Vec::new();
        values.record(&mut FieldVisitor { fields: &mut fields, message: None });
        if fields.is_empty() {
            return;
        }

        let mut extensions = span.extensions_mut();
        if let Some(scoped) = extensions.get_mut::<SpanHandler<W>>() {
            scoped.0 = scoped.0.with_attrs(&fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let level = Level::from(*event.metadata().level());
        let handler = self.span_handler(ctx.event_span(event));
        if !handler.enabled(level) {
            return;
        }

        let mut fields = Vec::new();
        let mut message = None;
        event.record(&mut FieldVisitor { fields: &mut fields, message: Some(&mut message) });

        let record = Record {
            time: Some(Utc::now()),
            level,
            message: message.unwrap_or_default().into(),
            attrs: fields,
        };

        let cx = opentelemetry::Context::current();
        if let Err(e) = handler.emit(&cx, &record) {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("error writing log record: {}", e);
        }
    }
}

/// Collects `tracing` fields as [`Attr`]s. The `message` field is routed to
/// `message` when the caller wants it, and kept as an attribute otherwise.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Attr>,
    pub message: Option<&'a mut Option<String>>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push(Attr::new(field.name(), value));
    }

    fn take_message(&mut self, field: &Field, text: impl FnOnce() -> String) -> bool {
        if field.name() != "message" {
            return false;
        }
        match self.message.as_deref_mut() {
            Some(slot) => {
                *slot = Some(text());
                true
            }
            None => false,
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if !self.take_message(field, || value.to_string()) {
            self.push(field, Value::from(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.take_message(field, || format!("{:?}", value)) {
            self.push(field, Value::from(format!("{:?}", value)));
        }
    }
}
