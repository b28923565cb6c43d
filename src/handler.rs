use crate::format::write_record;
use crate::level::Level;
use crate::pool::BufferPool;
use crate::record::Record;
use crate::state::AttrState;
use crate::trace::Correlation;
use crate::value::Attr;
use opentelemetry::Context;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Room reserved for the fixed fields of a line (time, level, trace ids,
/// braces) on top of the message.
const RECORD_OVERHEAD: usize = 160;

/// Writer type used when the concrete sink is chosen at runtime.
pub type BoxWriter = Box<dyn Write + Send>;

/// Newline-delimited JSON log handler.
///
/// A handler is an immutable node in a lineage: [`Handler::with_attrs`] and
/// [`Handler::with_group`] return new handlers carrying extra
/// pre-serialized attributes, while the root's writer and its lock are
/// shared by every descendant. Concurrent [`Handler::emit`] calls from any
/// handlers of one lineage never interleave their lines.
///
/// ```
/// use opentelemetry::Context;
/// use tracing_jsonlog::{Attr, Handler, Level, Record};
///
/// let root = Handler::new(Level::INFO, std::io::sink());
/// let req = root.with_group("req").with_attrs(&[Attr::new("id", 7i64)]);
/// req.emit(&Context::new(), &Record::new(Level::INFO, "done")).unwrap();
/// ```
pub struct Handler<W = BoxWriter> {
    min_level: Level,
    state: Arc<AttrState>,
    writer: Arc<Mutex<W>>,
    pool: Arc<BufferPool>,
}

impl<W: Write + Send> Handler<W> {
    /// Root handler drawing buffers from the process-wide pool.
    pub fn new(min_level: Level, writer: W) -> Self {
        Self::with_pool(min_level, writer, BufferPool::global())
    }

    /// Root handler drawing buffers from `pool`.
    pub fn with_pool(min_level: Level, writer: W, pool: Arc<BufferPool>) -> Self {
        Handler {
            min_level,
            state: Arc::new(AttrState::new(Arc::clone(&pool))),
            writer: Arc::new(Mutex::new(writer)),
            pool,
        }
    }

    /// Render `record` and write it as one line.
    ///
    /// Records below the handler's level are dropped without touching the
    /// writer or the buffer pool. Write errors are returned as-is.
    pub fn emit(&self, cx: &Context, record: &Record<'_>) -> io::Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }

        let mut state = AttrState::clone(&self.state);
        for attr in &record.attrs {
            state.attr(attr);
        }
        state.close_all();

        // The line is rendered around the fragment in the copy's own buffer.
        let mut line = state.into_buffer();
        line.reserve(record.message.len() + RECORD_OVERHEAD);
        write_record(
            &mut line,
            record.time.as_ref(),
            record.level,
            Correlation::from_context(cx).as_ref(),
            &record.message,
        );

        let result = self.writer.lock().write_all(&line);
        self.pool.release(line);
        result
    }

    /// Flush the shared writer.
    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl<W> Handler<W> {
    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Handler whose records all carry `attrs`. Returns a handler sharing
    /// this one's state when `attrs` is empty.
    pub fn with_attrs(&self, attrs: &[Attr]) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }
        let mut state = AttrState::clone(&self.state);
        for attr in attrs {
            state.attr(attr);
        }
        self.derive(state)
    }

    /// Handler whose later attributes are nested under `name`. The group is
    /// left open and is dropped from records that end up with nothing in
    /// it. Returns a handler sharing this one's state when `name` is empty.
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        let mut state = AttrState::clone(&self.state);
        state.open_group(name);
        self.derive(state)
    }

    fn derive(&self, state: AttrState) -> Self {
        Handler {
            min_level: self.min_level,
            state: Arc::new(state),
            writer: Arc::clone(&self.writer),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<W> Clone for Handler<W> {
    fn clone(&self) -> Self {
        Handler {
            min_level: self.min_level,
            state: Arc::clone(&self.state),
            writer: Arc::clone(&self.writer),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<W> fmt::Debug for Handler<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("min_level", &self.min_level)
            .field("attrs", &String::from_utf8_lossy(self.state.fragment()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{MAX_POOLED_CAPACITY, STATE_BUFFER_SIZE};
    use std::sync::atomic::Ordering;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn handler(level: Level) -> (Handler<SharedBuf>, SharedBuf, Arc<BufferPool>) {
        let out = SharedBuf::default();
        let pool = Arc::new(BufferPool::new());
        let h = Handler::with_pool(level, out.clone(), Arc::clone(&pool));
        (h, out, pool)
    }

    #[test]
    fn empty_derivations_share_state() {
        let (h, _, pool) = handler(Level::INFO);
        let a = h.with_attrs(&[]);
        let g = h.with_group("");
        assert!(Arc::ptr_eq(&h.state, &a.state));
        assert!(Arc::ptr_eq(&h.state, &g.state));
        assert_eq!(pool.acquired.load(Ordering::Relaxed), 0);

        let d = h.with_group("x");
        assert!(!Arc::ptr_eq(&h.state, &d.state));
        assert!(Arc::ptr_eq(&h.writer, &d.writer));
    }

    #[test]
    fn disabled_levels_touch_nothing() {
        let (h, out, pool) = handler(Level::WARN);
        let h = h.with_group("g");
        let acquired = pool.acquired.load(Ordering::Relaxed);

        h.emit(&Context::new(), &Record::new(Level::INFO, "dropped").attr(Attr::new("a", 1i64)))
            .unwrap();
        assert_eq!(out.contents(), "");
        assert_eq!(pool.acquired.load(Ordering::Relaxed), acquired);
        assert!(!h.enabled(Level::INFO));
        assert!(h.enabled(Level::WARN));
    }

    #[test]
    fn write_errors_are_returned() {
        let h = Handler::with_pool(Level::INFO, BrokenPipe, Arc::new(BufferPool::new()));
        let err = h.emit(&Context::new(), &Record::new(Level::ERROR, "x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn buffers_return_to_the_pool() {
        let (h, _, pool) = handler(Level::INFO);
        let h = h.with_attrs(&[Attr::new("svc", "api")]);
        let acquired = pool.acquired.load(Ordering::Relaxed);
        for _ in 0..10 {
            h.emit(&Context::new(), &Record::new(Level::INFO, "tick")).unwrap();
        }
        // One buffer per emission, served from the free list after the first.
        assert_eq!(pool.acquired.load(Ordering::Relaxed) - acquired, 10);
        assert_eq!(pool.reused.load(Ordering::Relaxed), 9);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn oversized_records_still_render() {
        let (h, out, _) = handler(Level::INFO);
        let big = "y".repeat(STATE_BUFFER_SIZE * 3);
        h.with_attrs(&[Attr::new("big", big.clone())])
            .emit(&Context::new(), &Record::new(Level::INFO, "m"))
            .unwrap();
        assert_eq!(
            out.contents(),
            format!("{{\"level\":\"INFO\",\"message\":\"m\",\"big\":\"{}\"}}\n", big)
        );
    }

    #[test]
    fn render_buffers_are_pooled_up_to_the_retention_cap() {
        let (h, _, pool) = handler(Level::INFO);

        let mid = "m".repeat(STATE_BUFFER_SIZE * 2);
        h.emit(&Context::new(), &Record::new(Level::INFO, mid)).unwrap();
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.discarded.load(Ordering::Relaxed), 0);

        let huge = "h".repeat(MAX_POOLED_CAPACITY * 2);
        h.emit(&Context::new(), &Record::new(Level::INFO, huge)).unwrap();
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.discarded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn siblings_do_not_see_each_other() {
        let (h, out, _) = handler(Level::INFO);
        let base = h.with_group("g");
        let a = base.with_attrs(&[Attr::new("a", 1i64)]);
        let b = base.with_attrs(&[Attr::new("b", 2i64)]);
        a.emit(&Context::new(), &Record::new(Level::INFO, "a")).unwrap();
        b.emit(&Context::new(), &Record::new(Level::INFO, "b")).unwrap();
        base.emit(&Context::new(), &Record::new(Level::INFO, "base")).unwrap();
        assert_eq!(
            out.contents(),
            concat!(
                "{\"level\":\"INFO\",\"message\":\"a\",\"g\":{\"a\":1}}\n",
                "{\"level\":\"INFO\",\"message\":\"b\",\"g\":{\"b\":2}}\n",
                "{\"level\":\"INFO\",\"message\":\"base\"}\n",
            )
        );
    }
}
