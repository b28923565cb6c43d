use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Capacity of a pooled buffer. Covers a record with a handful of short
/// attributes without resizing.
pub const STATE_BUFFER_SIZE: usize = 1024;

/// Buffers that grew beyond this are dropped on release instead of pooled,
/// so one huge record does not pin memory for every later caller.
pub const MAX_POOLED_CAPACITY: usize = 16 * 1024;

/// Idle buffers kept around at most.
pub const MAX_IDLE_BUFFERS: usize = 256;

static GLOBAL: OnceLock<Arc<BufferPool>> = OnceLock::new();

/// Free list of reusable byte buffers shared by every handler of a lineage.
///
/// Buffers move in and out by value: [`BufferPool::release`] consumes the
/// `Vec`, so a released buffer cannot be touched by its previous owner.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    /// Buffers handed out by [`BufferPool::acquire`].
    pub acquired: AtomicU64,
    /// Acquisitions served from the free list rather than a new allocation.
    pub reused: AtomicU64,
    /// Buffers accepted back into the free list.
    pub released: AtomicU64,
    /// Buffers dropped on release (too large, too small, or pool full).
    pub discarded: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide pool used by handlers that were not given their own.
    pub fn global() -> Arc<BufferPool> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(BufferPool::new())))
    }

    /// Take an empty buffer with at least [`STATE_BUFFER_SIZE`] capacity.
    pub fn acquire(&self) -> Vec<u8> {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        match self.free.lock().pop() {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => Vec::with_capacity(STATE_BUFFER_SIZE),
        }
    }

    /// Return a buffer for reuse.
    pub fn release(&self, mut buf: Vec<u8>) {
        let cap = buf.capacity();
        if cap == 0 {
            return;
        }
        if !(STATE_BUFFER_SIZE..=MAX_POOLED_CAPACITY).contains(&cap) {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        buf.clear();
        let mut free = self.free.lock();
        if free.len() >= MAX_IDLE_BUFFERS {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        free.push(buf);
        drop(free);
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of buffers currently waiting in the free list.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}
