//! Pre-serialized attributes accumulated along a handler lineage.
//!
//! The buffer holds the inside of a JSON object: `"a":1,"g":{"b":2`.
//! Groups are opened eagerly and closed (or rolled back, if nothing was
//! written inside them) only when a record is rendered.

use crate::format::{write_json, write_value};
use crate::pool::{BufferPool, STATE_BUFFER_SIZE};
use crate::value::{Attr, Value};
use std::mem;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct GroupMark {
    /// Buffer length before the group's key was written.
    offset: usize,
    /// Separator state to restore if the group is rolled back.
    needs_separator: bool,
}

#[derive(Debug)]
pub(crate) struct AttrState {
    buf: Vec<u8>,
    /// Buffer length right after the last confirmed attribute or closed
    /// non-empty group.
    confirmed: usize,
    marks: Vec<GroupMark>,
    needs_separator: bool,
    pool: Arc<BufferPool>,
}

impl AttrState {
    pub(crate) fn new(pool: Arc<BufferPool>) -> Self {
        AttrState {
            buf: Vec::new(),
            confirmed: 0,
            marks: Vec::new(),
            needs_separator: false,
            pool,
        }
    }

    /// The fragment built so far. Only a complete object body once
    /// [`AttrState::close_all`] has run.
    pub(crate) fn fragment(&self) -> &[u8] {
        &self.buf
    }

    /// Give up the buffer, leaving nothing for `Drop` to return to the pool.
    pub(crate) fn into_buffer(mut self) -> Vec<u8> {
        mem::take(&mut self.buf)
    }

    #[cfg(test)]
    pub(crate) fn open_groups(&self) -> usize {
        self.marks.len()
    }

    fn separate(&mut self) {
        if self.needs_separator {
            self.buf.push(b',');
        }
    }

    pub(crate) fn open_group(&mut self, name: &str) {
        self.marks.push(GroupMark {
            offset: self.buf.len(),
            needs_separator: self.needs_separator,
        });
        self.separate();
        write_json(&mut self.buf, name);
        self.buf.extend_from_slice(b":{");
        self.needs_separator = false;
    }

    pub(crate) fn close_group(&mut self) {
        let Some(mark) = self.marks.pop() else {
            return;
        };
        if self.confirmed > mark.offset {
            self.buf.push(b'}');
            self.confirmed = self.buf.len();
            self.needs_separator = true;
        } else {
            self.buf.truncate(mark.offset);
            self.needs_separator = mark.needs_separator;
        }
    }

    pub(crate) fn close_all(&mut self) {
        while !self.marks.is_empty() {
            self.close_group();
        }
    }

    pub(crate) fn attr(&mut self, attr: &Attr) {
        if attr.is_empty() {
            return;
        }
        let value = attr.value.resolve();
        match &*value {
            Value::Group(members) => {
                if members.is_empty() {
                    return;
                }
                let named = !attr.key.is_empty();
                if named {
                    self.open_group(&attr.key);
                }
                for member in members {
                    self.attr(member);
                }
                if named {
                    self.close_group();
                }
            }
            _ if attr.key.is_empty() => {}
            scalar => {
                self.separate();
                write_json(&mut self.buf, attr.key.as_ref());
                self.buf.push(b':');
                write_value(&mut self.buf, scalar);
                self.needs_separator = true;
                self.confirmed = self.buf.len();
            }
        }
    }
}

impl Clone for AttrState {
    /// Copy into a pooled buffer, or a fresh exact-size one when the content
    /// is larger than the pool's standard capacity.
    fn clone(&self) -> Self {
        let buf = if self.buf.len() > STATE_BUFFER_SIZE {
            self.buf.clone()
        } else {
            let mut buf = self.pool.acquire();
            buf.extend_from_slice(&self.buf);
            buf
        };
        AttrState {
            buf,
            confirmed: self.confirmed,
            marks: self.marks.clone(),
            needs_separator: self.needs_separator,
            pool: Arc::clone(&self.pool),
        }
    }
}

impl Drop for AttrState {
    fn drop(&mut self) {
        let buf = mem::take(&mut self.buf);
        self.pool.release(buf);
    }
}
