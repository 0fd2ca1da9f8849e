//! Per-thread recycling of small, short-lived buffers.
//!
//! Parsing and serializing node content asks for a small scratch buffer once per text or
//! attribute chunk. Instead of allocating each time, a buffer that was handed back with
//! [`BufferPool::release`] is kept in one of a fixed number of slots owned by the releasing
//! thread, and handed out again by [`BufferPool::acquire`] when a buffer of exactly the same length
//! is asked for.
//!
//! The pool is a best-effort cache, not an unbounded free list: when all slots of a thread are
//! occupied, releasing overwrites the slot picked by a rotating index, dropping its buffer.
//! Buffers of [`MAX_POOLED_LEN`] elements or more are never pooled.
//!
//! The slots and the rotating index are thread-local, so neither acquire nor release ever
//! synchronizes with another thread.

use std::{
    cell::RefCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::OnceLock,
};

use thread_local::ThreadLocal;

/// Buffers of this length or longer are never pooled.
pub const MAX_POOLED_LEN: usize = 128;

/// The number of slots per thread in the [`byte_pool`].
pub const BYTE_POOL_SLOTS: usize = 32;

/// The number of slots per thread in the [`char_pool`].
pub const CHAR_POOL_SLOTS: usize = 128;

/// The process-wide pool of byte buffers.
pub fn byte_pool() -> &'static BufferPool<u8> {
    static POOL: OnceLock<BufferPool<u8>> = OnceLock::new();
    POOL.get_or_init(|| BufferPool::new(BYTE_POOL_SLOTS, MAX_POOLED_LEN))
}

/// The process-wide pool of char buffers.
pub fn char_pool() -> &'static BufferPool<char> {
    static POOL: OnceLock<BufferPool<char>> = OnceLock::new();
    POOL.get_or_init(|| BufferPool::new(CHAR_POOL_SLOTS, MAX_POOLED_LEN))
}

/// A pool of buffers, with a separate set of slots for every thread that uses it.
pub struct BufferPool<T: Send> {
    slots_per_thread: usize,
    max_len: usize,
    local: ThreadLocal<RefCell<LocalSlots<T>>>,
}

struct LocalSlots<T> {
    slots: Box<[Option<Box<[T]>>]>,
    /// Picks the slot to overwrite when all of them are occupied.
    next_victim: usize,
}

impl<T> LocalSlots<T> {
    fn new(n: usize) -> Self {
        Self {
            slots: (0..n).map(|_| None).collect(),
            next_victim: 0,
        }
    }

    fn take_exact(&mut self, len: usize) -> Option<Box<[T]>> {
        self.slots
            .iter_mut()
            .find(|slot| slot.as_ref().map_or(false, |buf| buf.len() == len))
            .and_then(Option::take)
    }

    fn store(&mut self, buf: Box<[T]>) {
        if let Some(free) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *free = Some(buf);
            return;
        }
        let victim = self.next_victim % self.slots.len();
        self.next_victim = self.next_victim.wrapping_add(1);
        self.slots[victim] = Some(buf);
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl<T: Copy + Default + Send> BufferPool<T> {
    /// Create a pool keeping up to `slots_per_thread` buffers for every thread, each shorter than
    /// `max_len`.
    pub fn new(slots_per_thread: usize, max_len: usize) -> Self {
        assert!(slots_per_thread > 0);
        Self {
            slots_per_thread,
            max_len,
            local: ThreadLocal::new(),
        }
    }

    /// Get a buffer of exactly `len` elements.
    ///
    /// A buffer that was previously released by this thread is reused if one of the right length
    /// is pooled. Its contents are whatever the previous user left in it. Otherwise a fresh,
    /// default-filled buffer is allocated.
    pub fn acquire(&self, len: usize) -> Box<[T]> {
        if len < self.max_len {
            if let Some(buf) = self.local().borrow_mut().take_exact(len) {
                return buf;
            }
        }
        vec![T::default(); len].into_boxed_slice()
    }

    /// Hand a buffer back to the calling thread's slots.
    pub fn release(&self, buf: Box<[T]>) {
        if buf.len() >= self.max_len {
            return;
        }
        self.local().borrow_mut().store(buf);
    }

    /// Like [`BufferPool::acquire`], but the buffer is released automatically when the returned
    /// guard is dropped.
    pub fn acquire_guard(&self, len: usize) -> PooledBuffer<'_, T> {
        PooledBuffer {
            pool: self,
            buf: Some(self.acquire(len)),
        }
    }

    /// The number of buffers currently pooled for the calling thread.
    pub fn pooled_count(&self) -> usize {
        self.local().borrow().occupied()
    }

    pub fn slots_per_thread(&self) -> usize {
        self.slots_per_thread
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn local(&self) -> &RefCell<LocalSlots<T>> {
        self.local
            .get_or(|| RefCell::new(LocalSlots::new(self.slots_per_thread)))
    }
}

impl<T: Send> fmt::Debug for BufferPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("slots_per_thread", &self.slots_per_thread)
            .field("max_len", &self.max_len)
            .finish()
    }
}

/// A buffer borrowed from a [`BufferPool`] and released back into it on drop.
///
/// The buffer goes to the slots of the thread that drops the guard.
pub struct PooledBuffer<'a, T: Copy + Default + Send> {
    pool: &'a BufferPool<T>,
    buf: Option<Box<[T]>>,
}

impl<'a, T: Copy + Default + Send> PooledBuffer<'a, T> {
    /// Take the buffer out of the guard. It will not be returned to the pool.
    pub fn into_inner(mut self) -> Box<[T]> {
        // UNWRAP: the buffer is only taken out here and in `drop`.
        self.buf.take().unwrap()
    }
}

impl<'a, T: Copy + Default + Send> Deref for PooledBuffer<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl<'a, T: Copy + Default + Send> DerefMut for PooledBuffer<'a, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<'a, T: Copy + Default + Send> Drop for PooledBuffer<'a, T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
