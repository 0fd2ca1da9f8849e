//! A reentrant lock identified by a caller-chosen key, with bounded waits.
//!
//! The lock is held by at most one key at a time. The key that holds it may acquire it again
//! without blocking; it is freed once every acquisition has been matched by a release.
//!
//! Every blocking wait is bounded by the lock timeout. What happens when it elapses depends on the
//! mode the caller asked for:
//!
//! - [`LockMode::Exclusive`]: the acquisition fails with [`LockError::Timeout`].
//! - [`LockMode::Shared`]: the current holder is presumed stuck, a warning is logged and the lock is
//!   reassigned to the waiting key. Readers are never starved by a holder that forgot to release.
//!
//! Apart from that the mode is informational: a shared acquisition excludes every other key just
//! like an exclusive one.

use std::{
    fmt,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::{error::LockError, options::Options};

/// The kind of access a key asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A key-identified, reentrant lock whose waits are bounded by a timeout.
pub struct TimeoutMutex<K> {
    state: Mutex<State<K>>,
    /// Signalled whenever the holder changes.
    holder_changed: Condvar,
    timeout: Duration,
    poll_interval: Duration,
}

struct State<K> {
    holder: Option<K>,
    mode: Option<LockMode>,
    /// The number of outstanding acquisitions by the holder.
    count: usize,
    /// The number of threads currently blocked in `acquire` or `enter`.
    waiting: usize,
}

impl<K: Eq + Clone + fmt::Debug> TimeoutMutex<K> {
    /// Create a free lock using the lock timeout and poll interval of the given options.
    pub fn new(o: &Options) -> Self {
        Self::with_timeout(o.lock_timeout, o.lock_poll_interval)
    }

    /// Create a free lock with the given timeout. Blocked waiters re-check the elapsed time at
    /// least every `poll_interval`.
    pub fn with_timeout(timeout: Duration, poll_interval: Duration) -> Self {
        assert!(!poll_interval.is_zero());
        Self {
            state: Mutex::new(State {
                holder: None,
                mode: None,
                count: 0,
                waiting: 0,
            }),
            holder_changed: Condvar::new(),
            timeout,
            poll_interval,
        }
    }

    /// Acquire the lock for `key`.
    ///
    /// Returns immediately if `key` already holds the lock. Otherwise blocks until the lock is
    /// free or the timeout elapses; see the module documentation for what happens then.
    pub fn acquire(&self, key: &K, mode: LockMode) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.holder.as_ref() == Some(key) {
            state.count += 1;
            return Ok(());
        }

        if state.holder.is_some() {
            state.waiting += 1;
            let res = self.wait_until_free(&mut state, key, mode);
            state.waiting -= 1;
            match res? {
                Acquired::Reentered => return Ok(()),
                Acquired::Free => {}
            }
        }

        state.holder = Some(key.clone());
        state.mode = Some(mode);
        state.count = 1;
        drop(state);
        self.holder_changed.notify_all();
        Ok(())
    }

    fn wait_until_free(
        &self,
        state: &mut MutexGuard<'_, State<K>>,
        key: &K,
        mode: LockMode,
    ) -> Result<Acquired, LockError> {
        let start = Instant::now();
        loop {
            if state.holder.is_none() {
                return Ok(Acquired::Free);
            }
            // Another thread acting for the same key got the lock in the meantime.
            if state.holder.as_ref() == Some(key) {
                state.count += 1;
                return Ok(Acquired::Reentered);
            }

            let waited = start.elapsed();
            if waited >= self.timeout {
                match mode {
                    LockMode::Shared => {
                        warn!(
                            key = ?key,
                            previous = ?state.holder,
                            waited_ms = waited.as_millis() as u64,
                            "lock wait timed out, seizing the lock for shared access"
                        );
                        return Ok(Acquired::Free);
                    }
                    LockMode::Exclusive => {
                        debug!(key = ?key, holder = ?state.holder, "exclusive lock wait timed out");
                        return Err(LockError::Timeout {
                            holder: state
                                .holder
                                .as_ref()
                                .map(|holder| format!("{holder:?}"))
                                .unwrap_or_default(),
                            waited,
                        });
                    }
                }
            }

            let wait = self.poll_interval.min(self.timeout - waited);
            let _ = self.holder_changed.wait_for(state, wait);
        }
    }

    /// Wait until `key` holds the lock.
    ///
    /// Fails with [`LockError::NotAcquired`] if that does not happen within the timeout.
    pub fn enter(&self, key: &K) -> Result<(), LockError> {
        let mut state = self.state.lock();
        let start = Instant::now();
        while state.holder.as_ref() != Some(key) {
            let waited = start.elapsed();
            if waited >= self.timeout {
                return Err(LockError::NotAcquired {
                    key: format!("{key:?}"),
                    waited,
                });
            }

            let wait = self.poll_interval.min(self.timeout - waited);
            state.waiting += 1;
            let _ = self.holder_changed.wait_for(&mut state, wait);
            state.waiting -= 1;
        }
        Ok(())
    }

    /// Release one acquisition made by `key`.
    ///
    /// Once the last acquisition is released, the lock becomes free and all waiters are woken.
    /// Releasing a lock that `key` does not hold is a caller bug: it is logged and the lock is
    /// left as it is.
    pub fn release(&self, key: &K) {
        let mut state = self.state.lock();
        match state.holder.as_ref() {
            Some(holder) if holder == key => {}
            holder => {
                error!(key = ?key, holder = ?holder, "release of a lock not held by the key");
                return;
            }
        }

        state.count -= 1;
        if state.count == 0 {
            state.holder = None;
            state.mode = None;
            drop(state);
            self.holder_changed.notify_all();
        }
    }

    /// Acquire the lock for `key` and return a guard that releases it when dropped.
    pub fn lock(&self, key: K, mode: LockMode) -> Result<TimeoutMutexGuard<'_, K>, LockError> {
        self.acquire(&key, mode)?;
        Ok(TimeoutMutexGuard { mutex: self, key })
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    pub fn is_locked_by(&self, key: &K) -> bool {
        self.state.lock().holder.as_ref() == Some(key)
    }

    /// The key currently holding the lock.
    pub fn holder(&self) -> Option<K> {
        self.state.lock().holder.clone()
    }

    /// The number of outstanding acquisitions by the current holder. Zero if the lock is free.
    pub fn hold_count(&self) -> usize {
        self.state.lock().count
    }

    /// The mode the current holder asked for.
    pub fn mode(&self) -> Option<LockMode> {
        self.state.lock().mode
    }

    /// The number of threads blocked waiting on this lock.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<K: Eq + Clone + fmt::Debug> Default for TimeoutMutex<K> {
    fn default() -> Self {
        Self::new(&Options::new())
    }
}

impl<K: fmt::Debug> fmt::Debug for TimeoutMutex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimeoutMutex")
            .field("holder", &state.holder)
            .field("mode", &state.mode)
            .field("count", &state.count)
            .field("waiting", &state.waiting)
            .finish()
    }
}

enum Acquired {
    /// The lock is free (or was seized) and may be taken by the waiting key.
    Free,
    /// The waiting key already holds the lock and its count was incremented.
    Reentered,
}

/// Releases one acquisition of a [`TimeoutMutex`] when dropped.
pub struct TimeoutMutexGuard<'a, K: Eq + Clone + fmt::Debug> {
    mutex: &'a TimeoutMutex<K>,
    key: K,
}

impl<'a, K: Eq + Clone + fmt::Debug> TimeoutMutexGuard<'a, K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<'a, K: Eq + Clone + fmt::Debug> Drop for TimeoutMutexGuard<'a, K> {
    fn drop(&mut self) {
        self.mutex.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_lock() -> TimeoutMutex<u32> {
        TimeoutMutex::with_timeout(Duration::from_millis(200), Duration::from_millis(20))
    }

    #[test]
    fn reentrant_acquire() {
        let lock = short_lock();
        lock.acquire(&1, LockMode::Exclusive).unwrap();
        lock.acquire(&1, LockMode::Shared).unwrap();
        assert_eq!(lock.hold_count(), 2);
        // the mode of the first acquisition sticks
        assert_eq!(lock.mode(), Some(LockMode::Exclusive));

        lock.release(&1);
        assert!(lock.is_locked_by(&1));
        lock.release(&1);
        assert!(!lock.is_locked());
        assert_eq!(lock.mode(), None);
    }

    #[test]
    fn release_by_other_key_is_ignored() {
        let lock = short_lock();
        lock.release(&1);
        assert!(!lock.is_locked());

        lock.acquire(&1, LockMode::Exclusive).unwrap();
        lock.release(&2);
        assert_eq!(lock.holder(), Some(1));
        assert_eq!(lock.hold_count(), 1);
    }

    #[test]
    fn exclusive_timeout_fails() {
        let lock = short_lock();
        lock.acquire(&1, LockMode::Exclusive).unwrap();

        let start = Instant::now();
        let err = lock.acquire(&2, LockMode::Exclusive).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(matches!(err, LockError::Timeout { .. }));
        assert_eq!(lock.holder(), Some(1));
        assert_eq!(lock.waiting(), 0);
    }

    #[test]
    fn shared_timeout_seizes() {
        let lock = short_lock();
        lock.acquire(&1, LockMode::Exclusive).unwrap();
        lock.acquire(&1, LockMode::Exclusive).unwrap();

        lock.acquire(&2, LockMode::Shared).unwrap();
        assert_eq!(lock.holder(), Some(2));
        assert_eq!(lock.hold_count(), 1);
        assert_eq!(lock.mode(), Some(LockMode::Shared));

        // the previous holder no longer owns anything
        lock.release(&1);
        assert_eq!(lock.holder(), Some(2));
        lock.release(&2);
        assert!(!lock.is_locked());
    }

    #[test]
    fn enter_when_holding() {
        let lock = short_lock();
        lock.acquire(&7, LockMode::Shared).unwrap();
        lock.enter(&7).unwrap();
    }

    #[test]
    fn enter_times_out() {
        let lock = short_lock();
        assert!(matches!(lock.enter(&7), Err(LockError::NotAcquired { .. })));

        lock.acquire(&1, LockMode::Exclusive).unwrap();
        assert!(matches!(lock.enter(&7), Err(LockError::NotAcquired { .. })));
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = short_lock();
        {
            let _outer = lock.lock(3, LockMode::Exclusive).unwrap();
            let inner = lock.lock(3, LockMode::Exclusive).unwrap();
            assert_eq!(*inner.key(), 3);
            assert_eq!(lock.hold_count(), 2);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn defaults() {
        let lock = TimeoutMutex::<u32>::default();
        assert_eq!(lock.timeout(), Duration::from_secs(60));
    }
}
