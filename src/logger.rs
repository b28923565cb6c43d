use crate::handler::{BoxWriter, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attr;
use chrono::Utc;
use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::Context;
use std::error::Error;
use std::io::{self, Write};

/// An application error annotated with what was being attempted.
#[derive(thiserror::Error, Debug)]
#[error("{message}: {source}")]
pub struct ContextError {
    pub message: String,
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

/// Timestamping front end over a [`Handler`].
///
/// Services hand out one `Logger` per component; [`Logger::component`]
/// nests everything the component logs under its own group.
pub struct Logger<W = BoxWriter> {
    handler: Handler<W>,
}

impl<W> std::fmt::Debug for Logger<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("handler", &self.handler).finish()
    }
}

impl<W> Clone for Logger<W> {
    fn clone(&self) -> Self {
        Logger {
            handler: self.handler.clone(),
        }
    }
}

impl<W> Logger<W> {
    pub fn new(handler: Handler<W>) -> Self {
        Logger { handler }
    }

    pub fn handler(&self) -> &Handler<W> {
        &self.handler
    }

    /// Logger for a named component; its attributes land under `name`.
    pub fn component(&self, name: &str) -> Self {
        Logger::new(self.handler.with_group(name))
    }

    /// Logger whose records all carry `attrs`.
    pub fn with(&self, attrs: &[Attr]) -> Self {
        Logger::new(self.handler.with_attrs(attrs))
    }
}

impl<W: Write + Send> Logger<W> {
    /// Emit a record stamped with the current time. The clock is only read
    /// when `level` is enabled.
    pub fn log(
        &self,
        cx: &Context,
        level: Level,
        message: &str,
        attrs: impl IntoIterator<Item = Attr>,
    ) -> io::Result<()> {
        if !self.handler.enabled(level) {
            return Ok(());
        }
        let record = Record::new(level, message)
            .with_time(Utc::now())
            .attrs(attrs);
        self.handler.emit(cx, &record)
    }

    pub fn debug(&self, cx: &Context, message: &str, attrs: impl IntoIterator<Item = Attr>) -> io::Result<()> {
        self.log(cx, Level::DEBUG, message, attrs)
    }

    pub fn info(&self, cx: &Context, message: &str, attrs: impl IntoIterator<Item = Attr>) -> io::Result<()> {
        self.log(cx, Level::INFO, message, attrs)
    }

    pub fn warn(&self, cx: &Context, message: &str, attrs: impl IntoIterator<Item = Attr>) -> io::Result<()> {
        self.log(cx, Level::WARN, message, attrs)
    }

    pub fn error(&self, cx: &Context, message: &str, attrs: impl IntoIterator<Item = Attr>) -> io::Result<()> {
        self.log(cx, Level::ERROR, message, attrs)
    }

    /// Report a failure: log `message` at ERROR with an `error` attribute,
    /// mark the active span (if any) as failed, and return the error wrapped
    /// with `message` for the caller to propagate.
    ///
    /// Unlike the other methods this does not return write errors: a line
    /// that cannot be written is reported on stderr, and the wrapped error
    /// is returned regardless.
    pub fn err<E>(
        &self,
        cx: &Context,
        message: &str,
        err: E,
        attrs: impl IntoIterator<Item = Attr>,
    ) -> ContextError
    where
        E: Error + Send + Sync + 'static,
    {
        let attrs = attrs
            .into_iter()
            .chain(std::iter::once(Attr::new("error", err.to_string())));
        if let Err(write_err) = self.log(cx, Level::ERROR, message, attrs) {
            eprintln!("error writing log record: {}", write_err);
        }

        let span = cx.span();
        if span.span_context().is_valid() {
            span.record_error(&err);
            span.set_status(Status::error(message.to_string()));
        }

        ContextError {
            message: message.to_string(),
            source: Box::new(err),
        }
    }
}
