//! Environment variable names used by this crate for configuring logging
//! from services.
//!
//! Names follow the flag-to-env convention implemented by [`env_key`]:
//! the `log.level` setting is read from `LOG_LEVEL`.

use crate::init::{ConfigError, LogConfig};

/// Minimum level: `debug`, `info`, `warn`, `error`, optionally with an
/// offset such as `info+2`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Output format: `json` or `logfmt`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Whether spans open JSON groups: `true`/`false`/`1`/`0`.
pub const LOG_SPAN_GROUPS_ENV: &str = "LOG_SPAN_GROUPS";

/// Translate a dotted flag name into its environment variable:
/// `log.level` becomes `LOG_LEVEL`, `tls.server.crt-path` becomes
/// `TLS_SERVER_CRT_PATH`.
pub fn env_key(flag: &str) -> String {
    flag.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn parse_bool(s: &str) -> Result<bool, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool(s.to_string())),
    }
}

impl LogConfig {
    /// Build a config from the process environment, starting from
    /// [`LogConfig::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build a config from `KEY=value` pairs. Unrelated keys are ignored;
    /// the first invalid value is reported together with its key.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = LogConfig::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let applied = match key {
                LOG_LEVEL_ENV => value.parse().map(|level| config.level = level),
                LOG_FORMAT_ENV => value.parse().map(|format| config.format = format),
                LOG_SPAN_GROUPS_ENV => parse_bool(value).map(|on| config.span_groups = on),
                _ => Ok(()),
            };
            applied.map_err(|source| ConfigError::Env {
                key: key.to_string(),
                value: value.to_string(),
                source: Box::new(source),
            })?;
        }
        Ok(config)
    }
}
