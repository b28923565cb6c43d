use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on chained [`LogValue`] resolutions before giving up.
const MAX_RESOLVE_STEPS: usize = 100;

/// A value whose log representation is computed when the record is
/// encoded rather than when the attribute is built.
///
/// Handlers call [`LogValue::log_value`] once per attribute they process;
/// a group rollback never triggers a second evaluation.
pub trait LogValue: Send + Sync {
    fn log_value(&self) -> Value;
}

impl<F> LogValue for F
where
    F: Fn() -> Value + Send + Sync,
{
    fn log_value(&self) -> Value {
        self()
    }
}

/// Attribute value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(Cow<'static, str>),
    Time(DateTime<Utc>),
    Duration(Duration),
    Bytes(Cow<'static, [u8]>),
    Group(Vec<Attr>),
    Lazy(Arc<dyn LogValue>),
}

impl Value {
    /// Follow [`Value::Lazy`] indirections until a concrete value is
    /// reached. Non-lazy values are returned borrowed.
    pub fn resolve(&self) -> Cow<'_, Value> {
        let Value::Lazy(lazy) = self else {
            return Cow::Borrowed(self);
        };
        let mut value = lazy.log_value();
        for _ in 1..MAX_RESOLVE_STEPS {
            match value {
                Value::Lazy(next) => value = next.log_value(),
                resolved => return Cow::Owned(resolved),
            }
        }
        match value {
            Value::Lazy(_) => Cow::Owned(Value::Str(Cow::Owned(format!(
                "LogValue resolution did not settle after {} steps",
                MAX_RESOLVE_STEPS
            )))),
            resolved => Cow::Owned(resolved),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::I64(v) => f.debug_tuple("I64").field(v).finish(),
            Value::U64(v) => f.debug_tuple("U64").field(v).finish(),
            Value::F64(v) => f.debug_tuple("F64").field(v).finish(),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Time(v) => f.debug_tuple("Time").field(v).finish(),
            Value::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Value::Bytes(v) => f.debug_tuple("Bytes").field(v).finish(),
            Value::Group(v) => f.debug_tuple("Group").field(v).finish(),
            Value::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(<$conv>::from(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool as bool,
    i8 => I64 as i64,
    i16 => I64 as i64,
    i32 => I64 as i64,
    i64 => I64 as i64,
    u8 => U64 as u64,
    u16 => U64 as u64,
    u32 => U64 as u64,
    u64 => U64 as u64,
    f32 => F64 as f64,
    f64 => F64 as f64,
    DateTime<Utc> => Time as DateTime<Utc>,
    Duration => Duration as Duration,
}

impl From<&'static str> for Value {
    fn from(v: &'static str) -> Self {
        Value::Str(Cow::Borrowed(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Cow::Owned(v))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(v: Cow<'static, str>) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Cow::Owned(v))
    }
}

impl From<&'static [u8]> for Value {
    fn from(v: &'static [u8]) -> Self {
        Value::Bytes(Cow::Borrowed(v))
    }
}

impl From<Vec<Attr>> for Value {
    fn from(v: Vec<Attr>) -> Self {
        Value::Group(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A key/value pair attached to a handler or a record.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Nested group of attributes. An empty `key` inlines the members into
    /// the enclosing object.
    pub fn group(key: impl Into<Cow<'static, str>>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        Attr {
            key: key.into(),
            value: Value::Group(attrs.into_iter().collect()),
        }
    }

    /// Attribute whose value is produced by `value` at encoding time.
    pub fn lazy(key: impl Into<Cow<'static, str>>, value: impl LogValue + 'static) -> Self {
        Attr {
            key: key.into(),
            value: Value::Lazy(Arc::new(value)),
        }
    }

    /// The zero attribute: no key, null value. Handlers drop it.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.value.is_null()
    }
}
