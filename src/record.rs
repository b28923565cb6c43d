use crate::level::Level;
use crate::value::Attr;
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// One log event as handed to [`Handler::emit`](crate::handler::Handler::emit).
///
/// `time` is optional: records without a timestamp are rendered without a
/// `time` field.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub time: Option<DateTime<Utc>>,
    pub level: Level,
    pub message: Cow<'a, str>,
    pub attrs: Vec<Attr>,
}

impl<'a> Record<'a> {
    pub fn new(level: Level, message: impl Into<Cow<'a, str>>) -> Self {
        Record {
            time: None,
            level,
            message: message.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }
}
