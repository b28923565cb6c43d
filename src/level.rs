use crate::init::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record.
///
/// Levels are plain integers so that intermediate severities can be
/// expressed between the four named ones. The named levels are spaced four
/// apart; anything in between renders as an offset from the closest named
/// level below it, e.g. `INFO+2` or `DEBUG-4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Level(pub i32);

impl Level {
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    /// Level used for `tracing`'s `TRACE` events.
    pub const TRACE: Level = Level(-8);

    fn base(self) -> (&'static str, Level) {
        if self < Level::INFO {
            ("DEBUG", Level::DEBUG)
        } else if self < Level::WARN {
            ("INFO", Level::INFO)
        } else if self < Level::ERROR {
            ("WARN", Level::WARN)
        } else {
            ("ERROR", Level::ERROR)
        }
    }

    /// Closest `tracing` filter that lets every event at or above `self`
    /// through.
    pub fn as_filter(self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;
        if self <= Level::TRACE {
            LevelFilter::TRACE
        } else if self <= Level::DEBUG {
            LevelFilter::DEBUG
        } else if self <= Level::INFO {
            LevelFilter::INFO
        } else if self <= Level::WARN {
            LevelFilter::WARN
        } else {
            LevelFilter::ERROR
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, base) = self.base();
        let offset = self.0 - base.0;
        if offset == 0 {
            f.write_str(name)
        } else {
            write!(f, "{}{:+}", name, offset)
        }
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    /// Accepts the rendered form, case-insensitively: `info`, `WARN`,
    /// `debug-4`, `Error+1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownLevel(s.to_string());

        let (name, offset) = match s.find(&['+', '-'][..]) {
            Some(i) => {
                let offset = s[i..].parse::<i32>().map_err(|_| unknown())?;
                (&s[..i], offset)
            }
            None => (s, 0),
        };

        let base = match name.to_ascii_uppercase().as_str() {
            "DEBUG" => Level::DEBUG,
            "INFO" => Level::INFO,
            "WARN" => Level::WARN,
            "ERROR" => Level::ERROR,
            _ => return Err(unknown()),
        };
        base.0.checked_add(offset).map(Level).ok_or_else(unknown)
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::TRACE,
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_named_levels_and_offsets() {
        assert_eq!(Level::DEBUG.to_string(), "DEBUG");
        assert_eq!(Level::INFO.to_string(), "INFO");
        assert_eq!(Level::WARN.to_string(), "WARN");
        assert_eq!(Level::ERROR.to_string(), "ERROR");
        assert_eq!(Level(2).to_string(), "INFO+2");
        assert_eq!(Level::TRACE.to_string(), "DEBUG-4");
        assert_eq!(Level(12).to_string(), "ERROR+4");
    }

    #[test]
    fn parses_case_insensitively_with_offsets() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::INFO);
        assert_eq!("Warn".parse::<Level>().unwrap(), Level::WARN);
        assert_eq!("debug-4".parse::<Level>().unwrap(), Level::TRACE);
        assert_eq!("ERROR+1".parse::<Level>().unwrap(), Level(9));
    }

    #[test]
    fn rejects_unknown_levels() {
        for bad in ["", "verbose", "info+", "warn+x", "+1", "ERROR+2147483647", "debug-2147483647"] {
            let err = bad.parse::<Level>().unwrap_err();
            assert!(matches!(err, ConfigError::UnknownLevel(ref s) if s == bad), "{bad}");
        }
    }

    #[test]
    fn serializes_as_label() {
        assert_eq!(serde_json::to_string(&Level::WARN).unwrap(), "\"WARN\"");
        let lvl: Level = serde_json::from_str("\"INFO+1\"").unwrap();
        assert_eq!(lvl, Level(1));
    }

    #[test]
    fn maps_tracing_levels_and_filters() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::TRACE);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::ERROR);
        use tracing_subscriber::filter::LevelFilter;
        assert_eq!(Level::INFO.as_filter(), LevelFilter::INFO);
        assert_eq!(Level(1).as_filter(), LevelFilter::WARN);
        assert_eq!(Level::TRACE.as_filter(), LevelFilter::TRACE);
    }
}
