//! WebAssembly linear memory implementation
//!
//! A [`MemoryInstance`] is shared by every invocation running in one module
//! instance, so all access goes through `&self`.
//!
//! Memory layout follows the WebAssembly specification:
//! - Page size: 64KB (65,536 bytes)
//! - Address space: 32-bit (max 4GB)
//! - Byte order: little-endian
//! - Size only grows; it never shrinks while the instance is open
//!
//! The logical size lives in an atomic that is stored after the backing
//! buffer is large enough, and loaded by every accessor. A shared memory is
//! allocated at its maximum size up front so growth only moves that length.
//! Accessors report failure with `None`/`false` rather than trapping; the
//! interpreter turns a failed access into a trap.

use super::RuntimeError;
use crate::module::MemoryDefinition;
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

const PAGE_SIZE_BITS: u32 = 16;

/// A queue reaching this many waiters refuses further waits
const WAITER_LIMIT: u64 = 1 << 32;

/// Convert a page count to bytes
pub fn pages_to_bytes(pages: u32) -> u64 {
    u64::from(pages) << PAGE_SIZE_BITS
}

fn bytes_to_pages(bytes: u64) -> u32 {
    (bytes >> PAGE_SIZE_BITS) as u32
}

/// Human-readable size of a page count, e.g. 1 page is "64 Ki"
pub fn pages_to_unit_of_bytes(pages: u32) -> String {
    let k = u64::from(pages) * 64;
    if k < 1024 {
        return format!("{k} Ki");
    }
    let m = k / 1024;
    if m < 1024 {
        return format!("{m} Mi");
    }
    let g = m / 1024;
    if g < 1024 {
        return format!("{g} Gi");
    }
    format!("{} Ti", g / 1024)
}

/// Result of an atomic wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Released by `notify`
    Woken,
    /// The value in memory did not match the expected value; nothing was queued
    NotEqual,
    TimedOut,
    /// The queue for this address is full; nothing was queued
    TooManyWaiters,
}

#[derive(Debug, Default)]
struct Waiter {
    woken: Mutex<bool>,
    cond: Condvar,
}

/// A WebAssembly linear memory instance
#[derive(Debug)]
pub struct MemoryInstance {
    buffer: RwLock<Vec<u8>>,
    /// Logical size in bytes
    len: AtomicUsize,
    min: u32,
    cap: AtomicU32,
    max: u32,
    shared: bool,
    waiters: Mutex<HashMap<u32, VecDeque<Arc<Waiter>>>>,
    waiter_limit: u64,
    closed: AtomicBool,
}

impl MemoryInstance {
    /// Create a new memory instance with the given limits
    ///
    /// # Errors
    /// - Minimum exceeds maximum
    /// - Maximum exceeds the 4GB address space
    pub fn new(definition: &MemoryDefinition) -> Result<Self, RuntimeError> {
        let MemoryDefinition { min, cap, max, shared } = *definition;
        if max > MAX_PAGES {
            return Err(RuntimeError::InvalidMemory(format!(
                "maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
            )));
        }
        if min > max {
            return Err(RuntimeError::InvalidMemory(format!(
                "initial size {min} pages exceeds specified maximum {max} pages"
            )));
        }

        let len = pages_to_bytes(min) as usize;
        let (buffer, cap) = if shared {
            (vec![0u8; pages_to_bytes(max) as usize], max)
        } else {
            let cap = cap.clamp(min, max);
            let mut buffer = Vec::with_capacity(pages_to_bytes(cap) as usize);
            buffer.resize(len, 0);
            (buffer, cap)
        };

        Ok(MemoryInstance {
            buffer: RwLock::new(buffer),
            len: AtomicUsize::new(len),
            min,
            cap: AtomicU32::new(cap),
            max,
            shared,
            waiters: Mutex::new(HashMap::new()),
            waiter_limit: WAITER_LIMIT,
            closed: AtomicBool::new(false),
        })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Pages that can be reached without reallocating
    pub fn capacity_pages(&self) -> u32 {
        self.cap.load(Ordering::Acquire)
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Current logical size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.len.load(Ordering::Acquire) as u64
    }

    /// Current logical size in pages
    pub fn pages(&self) -> u32 {
        bytes_to_pages(self.size())
    }

    /// True when `byte_count` bytes starting at `offset` lie within the logical size
    #[inline]
    pub fn has_size(&self, offset: u32, byte_count: u64) -> bool {
        u64::from(offset) + byte_count <= self.size()
    }

    /// Grow memory by `delta` pages
    ///
    /// Returns the previous size in pages, or `None` without changing anything
    /// if the new size would exceed the maximum.
    pub fn grow(&self, delta: u32) -> Option<u32> {
        let mut buffer = self.buffer.write();
        let current = self.pages();
        if delta == 0 {
            return Some(current);
        }

        let new_pages = current.checked_add(delta)?;
        if new_pages > self.max || self.closed.load(Ordering::Acquire) {
            tracing::trace!(current, delta, max = self.max, "memory.grow refused");
            return None;
        }

        let new_len = pages_to_bytes(new_pages) as usize;
        if !self.shared {
            if buffer.capacity() < new_len {
                let additional = new_len - buffer.len();
                buffer.try_reserve_exact(additional).ok()?;
            }
            buffer.resize(new_len, 0);
            if new_pages > self.cap.load(Ordering::Acquire) {
                self.cap.store(new_pages, Ordering::Release);
            }
        }
        self.len.store(new_len, Ordering::Release);
        tracing::trace!(previous = current, pages = new_pages, "memory grown");
        Some(current)
    }

    /// Release the backing buffer; every later access fails
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut buffer = self.buffer.write();
        self.len.store(0, Ordering::Release);
        *buffer = Vec::new();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    fn read_with<T>(&self, offset: u32, width: usize, f: impl FnOnce(&[u8]) -> T) -> Option<T> {
        if !self.has_size(offset, width as u64) {
            return None;
        }
        let start = offset as usize;
        let buffer = self.buffer.read();
        buffer.get(start..start + width).map(f)
    }

    #[inline]
    fn write_with(&self, offset: u32, width: usize, f: impl FnOnce(&mut [u8])) -> bool {
        if !self.has_size(offset, width as u64) {
            return false;
        }
        let start = offset as usize;
        let mut buffer = self.buffer.write();
        match buffer.get_mut(start..start + width) {
            Some(bytes) => {
                f(bytes);
                true
            }
            None => false,
        }
    }

    pub fn read_byte(&self, offset: u32) -> Option<u8> {
        self.read_with(offset, 1, |b| b[0])
    }

    pub fn read_u16_le(&self, offset: u32) -> Option<u16> {
        self.read_with(offset, 2, LittleEndian::read_u16)
    }

    pub fn read_u32_le(&self, offset: u32) -> Option<u32> {
        self.read_with(offset, 4, LittleEndian::read_u32)
    }

    pub fn read_u64_le(&self, offset: u32) -> Option<u64> {
        self.read_with(offset, 8, LittleEndian::read_u64)
    }

    pub fn read_f32_le(&self, offset: u32) -> Option<f32> {
        self.read_with(offset, 4, LittleEndian::read_f32)
    }

    pub fn read_f64_le(&self, offset: u32) -> Option<f64> {
        self.read_with(offset, 8, LittleEndian::read_f64)
    }

    /// Copy `byte_count` bytes starting at `offset`
    pub fn read(&self, offset: u32, byte_count: u32) -> Option<Vec<u8>> {
        self.read_with(offset, byte_count as usize, <[u8]>::to_vec)
    }

    #[must_use]
    pub fn write_byte(&self, offset: u32, v: u8) -> bool {
        self.write_with(offset, 1, |b| b[0] = v)
    }

    #[must_use]
    pub fn write_u16_le(&self, offset: u32, v: u16) -> bool {
        self.write_with(offset, 2, |b| LittleEndian::write_u16(b, v))
    }

    #[must_use]
    pub fn write_u32_le(&self, offset: u32, v: u32) -> bool {
        self.write_with(offset, 4, |b| LittleEndian::write_u32(b, v))
    }

    #[must_use]
    pub fn write_u64_le(&self, offset: u32, v: u64) -> bool {
        self.write_with(offset, 8, |b| LittleEndian::write_u64(b, v))
    }

    #[must_use]
    pub fn write_f32_le(&self, offset: u32, v: f32) -> bool {
        self.write_with(offset, 4, |b| LittleEndian::write_f32(b, v))
    }

    #[must_use]
    pub fn write_f64_le(&self, offset: u32, v: f64) -> bool {
        self.write_with(offset, 8, |b| LittleEndian::write_f64(b, v))
    }

    #[must_use]
    pub fn write(&self, offset: u32, bytes: &[u8]) -> bool {
        self.write_with(offset, bytes.len(), |b| b.copy_from_slice(bytes))
    }

    #[must_use]
    pub fn write_string(&self, offset: u32, s: &str) -> bool {
        self.write(offset, s.as_bytes())
    }

    /// Suspend the caller until `offset` is notified, or `timeout_nanos` elapse
    ///
    /// A negative timeout waits forever.
    pub fn wait(&self, offset: u32, timeout_nanos: i64) -> WaitOutcome {
        self.wait_if(offset, timeout_nanos, || true)
    }

    /// `memory.atomic.wait32`: wait only if the 32-bit value at `offset` equals `expected`
    pub fn wait32(&self, offset: u32, expected: u32, timeout_nanos: i64) -> WaitOutcome {
        self.wait_if(offset, timeout_nanos, || self.read_u32_le(offset) == Some(expected))
    }

    /// `memory.atomic.wait64`: wait only if the 64-bit value at `offset` equals `expected`
    pub fn wait64(&self, offset: u32, expected: u64, timeout_nanos: i64) -> WaitOutcome {
        self.wait_if(offset, timeout_nanos, || self.read_u64_le(offset) == Some(expected))
    }

    /// The condition is evaluated while holding the waiter lock, so a notify
    /// issued after a store that changes the value cannot be missed.
    fn wait_if(&self, offset: u32, timeout_nanos: i64, condition: impl FnOnce() -> bool) -> WaitOutcome {
        let waiter = {
            let mut waiters = self.waiters.lock();
            if !condition() {
                return WaitOutcome::NotEqual;
            }
            let queue = waiters.entry(offset).or_default();
            if queue.len() as u64 + 1 >= self.waiter_limit {
                if queue.is_empty() {
                    waiters.remove(&offset);
                }
                return WaitOutcome::TooManyWaiters;
            }
            let waiter = Arc::new(Waiter::default());
            queue.push_back(Arc::clone(&waiter));
            waiter
        };
        tracing::trace!(offset, timeout_nanos, "waiting");

        {
            let mut woken = waiter.woken.lock();
            if timeout_nanos < 0 {
                while !*woken {
                    waiter.cond.wait(&mut woken);
                }
                return WaitOutcome::Woken;
            }
            let deadline = Instant::now() + Duration::from_nanos(timeout_nanos as u64);
            while !*woken {
                if waiter.cond.wait_until(&mut woken, deadline).timed_out() {
                    break;
                }
            }
            if *woken {
                return WaitOutcome::Woken;
            }
        }

        // A notify that dequeued us after the deadline still counts as a wakeup.
        let mut waiters = self.waiters.lock();
        let Some(queue) = waiters.get_mut(&offset) else {
            return WaitOutcome::Woken;
        };
        let Some(position) = queue.iter().position(|w| Arc::ptr_eq(w, &waiter)) else {
            return WaitOutcome::Woken;
        };
        queue.remove(position);
        if queue.is_empty() {
            waiters.remove(&offset);
        }
        tracing::trace!(offset, "wait timed out");
        WaitOutcome::TimedOut
    }

    /// Wake at most `count` waiters on `offset`, oldest first; returns how many woke
    pub fn notify(&self, offset: u32, count: u32) -> u32 {
        let mut waiters = self.waiters.lock();
        Self::wake(&mut waiters, offset, count)
    }

    fn wake(waiters: &mut HashMap<u32, VecDeque<Arc<Waiter>>>, offset: u32, count: u32) -> u32 {
        let Some(queue) = waiters.get_mut(&offset) else {
            return 0;
        };

        let mut woken = 0;
        while woken < count {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            *waiter.woken.lock() = true;
            waiter.cond.notify_one();
            woken += 1;
        }

        if queue.is_empty() {
            waiters.remove(&offset);
        }
        tracing::trace!(offset, count, woken, "notified");
        woken
    }

    /// Number of callers currently queued on `offset`
    pub fn waiter_count(&self, offset: u32) -> usize {
        self.waiters.lock().get(&offset).map_or(0, VecDeque::len)
    }

    #[cfg(test)]
    fn with_waiter_limit(mut self, limit: u64) -> Self {
        self.waiter_limit = limit;
        self
    }
}
