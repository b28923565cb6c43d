#![allow(dead_code)]

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// In-memory sink that can be cloned into a handler and inspected later.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).expect("utf-8 output")
    }

    /// Every line parsed as JSON; panics on the first invalid one.
    pub fn lines(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .map(|line| {
                serde_json::from_str(line).unwrap_or_else(|e| panic!("invalid line {line:?}: {e}"))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
