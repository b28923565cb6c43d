//! JSON encoding of values and assembly of a complete record line.

use crate::level::Level;
use crate::trace::Correlation;
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Write `value` as JSON, or `null` if it refuses to serialize.
pub(crate) fn write_json<T: Serialize + ?Sized>(buf: &mut Vec<u8>, value: &T) {
    let start = buf.len();
    if serde_json::to_writer(&mut *buf, value).is_err() {
        buf.truncate(start);
        buf.extend_from_slice(b"null");
    }
}

fn write_fmt(buf: &mut Vec<u8>, args: fmt::Arguments<'_>) {
    // Writing into a Vec cannot fail.
    let _ = buf.write_fmt(args);
}

/// Encode a scalar attribute value. Groups and lazy values never reach this
/// point; attribute state resolves and expands them first.
pub(crate) fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null | Value::Group(_) | Value::Lazy(_) => buf.extend_from_slice(b"null"),
        Value::Bool(v) => write_json(buf, v),
        Value::I64(v) => write_json(buf, v),
        Value::U64(v) => write_json(buf, v),
        // serde_json already writes NaN and infinities as null.
        Value::F64(v) => write_json(buf, v),
        Value::Str(v) => write_json(buf, v.as_ref()),
        Value::Time(v) => write_time(buf, v),
        Value::Duration(v) => write_fmt(buf, format_args!("\"{}\"", HumanDuration(*v))),
        Value::Bytes(v) => {
            buf.push(b'"');
            buf.extend_from_slice(STANDARD.encode(v).as_bytes());
            buf.push(b'"');
        }
    }
}

fn write_time(buf: &mut Vec<u8>, t: &DateTime<Utc>) {
    write_fmt(
        buf,
        format_args!("\"{}\"", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
}

/// Turn `buf`, holding the closed attribute fragment of a record (no
/// surrounding braces), into the complete line, newline included.
///
/// The fixed fields are written after the fragment and rotated to the front,
/// so the line is built in the fragment's own storage.
pub(crate) fn write_record(
    buf: &mut Vec<u8>,
    time: Option<&DateTime<Utc>>,
    level: Level,
    trace: Option<&Correlation>,
    message: &str,
) {
    let fragment_len = buf.len();
    buf.push(b'{');

    if let Some(t) = time {
        buf.extend_from_slice(b"\"time\":");
        write_time(buf, t);
        buf.push(b',');
    }

    buf.extend_from_slice(b"\"level\":");
    write_json(buf, &level);

    if let Some(c) = trace {
        write_fmt(
            buf,
            format_args!(",\"trace_id\":\"{}\",\"span_id\":\"{}\"", c.trace_id, c.span_id),
        );
    }

    buf.extend_from_slice(b",\"message\":");
    write_json(buf, message);

    if fragment_len > 0 {
        buf.push(b',');
    }
    let head_len = buf.len() - fragment_len;
    buf.rotate_right(head_len);
    buf.extend_from_slice(b"}\n");
}

/// Unit-suffixed rendering of a duration: `0s`, `250ns`, `1.5µs`,
/// `12ms`, `5.734s`, `13h17m5.734s`.
pub struct HumanDuration(pub Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos == 0 {
            return f.write_str("0s");
        }
        if nanos < 1_000 {
            return write!(f, "{}ns", nanos);
        }
        if nanos < 1_000_000 {
            write_fixed(f, nanos, 1_000)?;
            return f.write_str("µs");
        }
        if nanos < 1_000_000_000 {
            write_fixed(f, nanos, 1_000_000)?;
            return f.write_str("ms");
        }

        let secs = self.0.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        let sub = u128::from(seconds) * 1_000_000_000 + u128::from(self.0.subsec_nanos());
        write_fixed(f, sub, 1_000_000_000)?;
        f.write_str("s")
    }
}

/// `value / scale` with the remainder as a decimal fraction, trailing zeros
/// trimmed.
fn write_fixed(f: &mut fmt::Formatter<'_>, value: u128, scale: u128) -> fmt::Result {
    write!(f, "{}", value / scale)?;
    let mut frac = value % scale;
    if frac == 0 {
        return Ok(());
    }
    let mut width = scale.ilog10() as usize;
    while frac % 10 == 0 {
        frac /= 10;
        width -= 1;
    }
    write!(f, ".{:0width$}", frac, width = width)
}
