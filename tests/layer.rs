mod common;

use common::SharedBuf;
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use tracing_jsonlog::{Handler, JsonLayer, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn layer(level: Level) -> (JsonLayer<SharedBuf>, SharedBuf) {
    let out = SharedBuf::default();
    (JsonLayer::new(Handler::new(level, out.clone())), out)
}

#[test]
fn events_become_json_lines() {
    let (layer, out) = layer(Level::DEBUG);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::error!(user_id = 42, reason = "invalid password", "authentication failed");
    });

    let lines = out.lines();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["level"], "ERROR");
    assert_eq!(line["message"], "authentication failed");
    assert_eq!(line["user_id"], 42);
    assert_eq!(line["reason"], "invalid password");
    assert!(line["time"].is_string());
    assert!(line.get("trace_id").is_none());
}

#[test]
fn level_gating_uses_handler_level() {
    let (layer, out) = layer(Level::INFO);
    let total = layer.total_events.clone();
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::debug!("hidden");
        tracing::trace!("hidden too");
        tracing::info!("shown");
    });

    let lines = out.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "shown");
    assert_eq!(total.load(Ordering::Relaxed), 3);
}

#[test]
fn trace_events_render_below_debug() {
    let (layer, out) = layer(Level::TRACE);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::trace!("very fine");
    });
    assert_eq!(out.lines()[0]["level"], "DEBUG-4");
}

#[test]
fn spans_open_groups() {
    let (layer, out) = layer(Level::DEBUG);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let request = tracing::info_span!("request", id = 7, route = tracing::field::Empty);
        let _r = request.enter();
        request.record("route", "/login");

        let db = tracing::info_span!("db", table = "users");
        let _d = db.enter();
        tracing::warn!(rows = 0u64, "no rows");

        let empty = tracing::info_span!("empty");
        let _e = empty.enter();
        tracing::info!("nothing scoped");
    });

    let lines = out.lines();
    assert_eq!(
        lines[0]["request"],
        serde_json::json!({
            "id": 7,
            "route": "/login",
            "db": {"table": "users", "rows": 0},
        })
    );
    // The `empty` span adds no group of its own.
    assert_eq!(
        lines[1]["request"],
        serde_json::json!({"id": 7, "route": "/login", "db": {"table": "users"}})
    );
}

#[test]
fn flat_spans_share_the_top_level() {
    let (layer, out) = layer(Level::DEBUG);
    let layer = layer.with_span_groups(false);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let span = tracing::info_span!("request", id = 7);
        let _g = span.enter();
        tracing::info!(ok = true, "handled");
    });

    let line = &out.lines()[0];
    assert_eq!(line["id"], 7);
    assert_eq!(line["ok"], true);
    assert!(line.get("request").is_none());
}

#[test]
fn current_otel_context_supplies_trace_ids() {
    let (layer, out) = layer(Level::DEBUG);
    let sc = SpanContext::new(
        TraceId::from_hex("5b8aa5a2d2c872e8321cf37308d69df2").unwrap(),
        SpanId::from_hex("051581bf3cb55c13").unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let _cx = opentelemetry::Context::new()
            .with_remote_span_context(sc)
            .attach();
        tracing::info!("correlated");
    });

    let line = &out.lines()[0];
    assert_eq!(line["trace_id"], "5b8aa5a2d2c872e8321cf37308d69df2");
    assert_eq!(line["span_id"], "051581bf3cb55c13");
}

struct Closed;

impl Write for Closed {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn write_failures_are_counted() {
    let layer = JsonLayer::new(Handler::new(Level::INFO, Closed));
    let failed = layer.failed_events.clone();
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::info!("lost");
        tracing::info!("lost again");
    });
    assert_eq!(failed.load(Ordering::Relaxed), 2);
}
