use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use opentelemetry::Context;

/// Trace and span identifiers of the span active in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

impl Correlation {
    /// Identifiers of the active span in `cx`, if it carries a valid span
    /// context.
    pub fn from_context(cx: &Context) -> Option<Self> {
        let span = cx.span();
        let sc = span.span_context();
        if !sc.is_valid() {
            return None;
        }
        Some(Correlation {
            trace_id: sc.trace_id(),
            span_id: sc.span_id(),
        })
    }
}
