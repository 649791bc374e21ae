//! Pool of reusable copy buffers.
//!
//! Buffers are checked out as [`PooledBuffer`] guards and go back to the
//! pool when the guard drops, so every acquisition is released exactly once
//! on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Size of each copy buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Idle buffers kept by the global pool.
pub const DEFAULT_MAX_IDLE: usize = 1024;

static GLOBAL_POOL: OnceLock<Arc<BufferPool>> = OnceLock::new();

/// A bounded free-list of fixed-size byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    max_idle: usize,
    available: Mutex<Vec<Box<[u8]>>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            buffer_size,
            max_idle,
            available: Mutex::new(Vec::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Process-wide pool shared by all relays.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_POOL.get_or_init(|| Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE)))
    }

    /// Check out a buffer, allocating one if none is idle.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let reused = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let buf = reused.unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());
        self.acquired.fetch_add(1, Ordering::SeqCst);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, buf: Box<[u8]>) {
        {
            let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
            if available.len() < self.max_idle {
                available.push(buf);
            }
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Total acquisitions so far.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Total releases so far.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Buffers currently checked out.
    pub fn in_use(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }

    /// Buffers waiting to be reused.
    pub fn idle(&self) -> usize {
        self.available.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Box<[u8]>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
