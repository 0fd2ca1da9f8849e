use std::time::Duration;

/// Options for constructing the primitives of this crate.
#[derive(Debug, Clone)]
pub struct Options {
    /// How long a blocked acquisition waits before it gives up (or seizes, for shared mode).
    pub(crate) lock_timeout: Duration,
    /// The granularity at which blocked waiters re-check the elapsed time.
    pub(crate) lock_poll_interval: Duration,
    /// The capacity of a reference-counted cache. The cache holds at most `cache_buffers - 1`
    /// entries.
    pub(crate) cache_buffers: usize,
}

impl Options {
    /// Create a new `Options` instance with the default values.
    pub fn new() -> Self {
        Self {
            lock_timeout: Duration::from_millis(60_000),
            lock_poll_interval: Duration::from_secs(1),
            cache_buffers: 32,
        }
    }

    /// Set the lock timeout.
    ///
    /// Default: 60s.
    pub fn lock_timeout(&mut self, lock_timeout: Duration) {
        self.lock_timeout = lock_timeout;
    }

    /// Set the interval at which blocked lock waiters wake up to check the timeout.
    ///
    /// Must be non-zero.
    ///
    /// Default: 1s.
    pub fn lock_poll_interval(&mut self, lock_poll_interval: Duration) {
        assert!(!lock_poll_interval.is_zero());
        self.lock_poll_interval = lock_poll_interval;
    }

    /// Set the capacity of reference-counted caches.
    ///
    /// Must be more than 1.
    ///
    /// Default: 32.
    pub fn cache_buffers(&mut self, cache_buffers: usize) {
        assert!(cache_buffers > 1);
        self.cache_buffers = cache_buffers;
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn defaults() {
    let o = Options::new();
    assert_eq!(o.lock_timeout, Duration::from_secs(60));
    assert_eq!(o.lock_poll_interval, Duration::from_secs(1));
    assert_eq!(o.cache_buffers, 32);
}
