//! Concurrency and memory primitives of the xstore storage layer.
//!
//! The broker and page-manager layers build on a handful of independent pieces:
//!
//! - [`buffer_pool`]: per-thread recycling of small byte and char buffers.
//! - [`lock_free_stack`]: a Treiber stack for lock-free hand-off between threads.
//! - [`timeout_mutex`]: a key-identified, reentrant lock whose waits are bounded by a timeout.
//! - [`refcount_cache`]: a bounded cache of hot metadata evicted by a refcount sweep.
//!
//! Node addresses and the integer codecs live in `xstore-core` and are re-exported here.

pub use xstore_core::{address, varint, ByteReader, ByteWriter, DecodeError, StorageAddress};

pub use buffer_pool::{byte_pool, char_pool, BufferPool, PooledBuffer};
pub use error::LockError;
pub use lock_free_stack::LockFreeStack;
pub use options::Options;
pub use refcount_cache::{RefCountCache, SharedRefCountCache};
pub use timeout_mutex::{LockMode, TimeoutMutex, TimeoutMutexGuard};

pub mod buffer_pool;
pub mod lock_free_stack;
pub mod refcount_cache;
pub mod timeout_mutex;

mod error;
mod options;

#[cfg(feature = "benchmarks")]
pub mod benches;
