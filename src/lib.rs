//! Newline-delimited JSON logging.
//!
//! A [`Handler`] turns [`Record`]s into one JSON object per line:
//!
//! ```text
//! {"time":"2023-10-16T06:04:02.123Z","level":"INFO","trace_id":"…","span_id":"…","message":"done","req":{"id":7}}
//! ```
//!
//! Handlers form lineages: [`Handler::with_attrs`] and
//! [`Handler::with_group`] pre-serialize attributes once so that emitting
//! a record only appends the per-call attributes. Groups that end up empty
//! are dropped from the output. Buffers come from a shared [`BufferPool`].
//!
//! [`JsonLayer`] plugs a handler into `tracing`, and [`init::init_tracing`]
//! installs it as the global subscriber.

pub mod env;
pub mod format;
pub mod handler;
pub mod init;
pub mod layer;
pub mod level;
pub mod logger;
pub mod pool;
pub mod record;
mod state;
pub mod trace;
pub mod value;

pub use handler::{BoxWriter, Handler};
pub use init::{build_subscriber, init_tracing, init_tracing_with_config, ConfigError, InitError, LogConfig, LogFormat};
pub use layer::JsonLayer;
pub use level::Level;
pub use logger::{ContextError, Logger};
pub use pool::BufferPool;
pub use record::Record;
pub use value::{Attr, LogValue, Value};
