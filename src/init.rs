use crate::handler::Handler;
use crate::layer::JsonLayer;
use crate::level::Level;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

/// Output encoding of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, written by [`JsonLayer`].
    #[default]
    Json,
    /// Human-readable text lines from `tracing_subscriber::fmt`: timestamp,
    /// level, enclosing spans, message, then the event's fields as
    /// `key=value`. Not machine-parseable logfmt.
    Logfmt,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(LogFormat::Json),
            "logfmt" => Ok(LogFormat::Logfmt),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
///
/// **Fields**
/// - `level`: minimum level written; records below it are dropped before
///   any formatting work.
/// - `format`: [`LogFormat::Json`] or [`LogFormat::Logfmt`].
/// - `span_groups`: for JSON output, nest span fields and the events inside
///   a span under a group named after the span.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub span_groups: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            span_groups: true,
        }
    }
}

/// Invalid logging configuration. Surfaces at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown log level: {0:?}")]
    UnknownLevel(String),

    #[error("unknown log format: {0:?}")]
    UnknownFormat(String),

    #[error("invalid boolean: {0:?}")]
    InvalidBool(String),

    #[error("set {key}={value} from env: {source}")]
    Env {
        key: String,
        value: String,
        #[source]
        source: Box<ConfigError>,
    },
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("global tracing subscriber already installed")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber writing to `out` according to
/// `config`.
///
/// **Effects**
///
/// JSON output installs a [`Registry`] with a [`JsonLayer`]; logfmt output
/// installs the `fmt` layer instead. Both are filtered at `config.level`.
/// Fails if a global subscriber is already set.
pub fn init_tracing_with_config<W>(out: W, config: LogConfig) -> Result<(), InitError>
where
    W: Write + Send + 'static,
{
    tracing::subscriber::set_global_default(build_subscriber(out, config))?;
    Ok(())
}

/// The subscriber [`init_tracing_with_config`] installs, for callers that
/// scope it with `tracing::subscriber::with_default` instead.
pub fn build_subscriber<W>(out: W, config: LogConfig) -> Box<dyn Subscriber + Send + Sync>
where
    W: Write + Send + 'static,
{
    let filter = config.level.as_filter();
    match config.format {
        LogFormat::Json => {
            let handler = Handler::new(config.level, out);
            let layer = JsonLayer::new(handler).with_span_groups(config.span_groups);
            Box::new(Registry::default().with(layer.with_filter(filter)))
        }
        LogFormat::Logfmt => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(std::sync::Mutex::new(out));
            Box::new(Registry::default().with(fmt_layer.with_filter(filter)))
        }
    }
}

/// Install a global subscriber writing to stdout.
///
/// Equivalent to [`init_tracing_with_config`] with `std::io::stdout()`.
/// This is the recommended entrypoint for typical services.
pub fn init_tracing(config: LogConfig) -> Result<(), InitError> {
    init_tracing_with_config(std::io::stdout(), config)
}
