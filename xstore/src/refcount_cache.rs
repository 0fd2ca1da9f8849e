//! A bounded cache of hot metadata objects (e.g. collection descriptors) evicted by a
//! reference-count sweep.
//!
//! Every entry carries a reference count that is bumped whenever the entry is added again or
//! looked up. When the cache is full, a sweep walks the entries in key order and decrements each
//! count it passes; the first entry whose count drops below one is evicted and the sweep stops.
//! Entries that were used recently survive a sweep by spending their extra references, which gives
//! an approximation of LRU with constant bookkeeping per access.
//!
//! The cache is not synchronized. All mutating methods take `&mut self`, so concurrent use requires
//! the caller to put the cache behind a lock it holds for the duration of each call, usually the
//! same lock that guards the owning broker state. [`SharedRefCountCache`] names that arrangement.

use std::{borrow::Borrow, collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::options::Options;

/// A cache shared between threads behind a caller-visible lock.
pub type SharedRefCountCache<K, V> = Arc<Mutex<RefCountCache<K, V>>>;

/// A bounded, key-ordered cache evicted by a reference-count sweep.
pub struct RefCountCache<K, V> {
    entries: BTreeMap<K, Entry<V>>,
    /// The cache never holds this many entries after an `add`.
    buffers: usize,
    hits: u64,
    fails: u64,
}

struct Entry<V> {
    value: V,
    ref_count: u32,
}

impl<K: Ord + Clone, V> RefCountCache<K, V> {
    /// Create an empty cache with the capacity given by the options.
    pub fn new(o: &Options) -> Self {
        Self::with_buffers(o.cache_buffers)
    }

    /// Create an empty cache holding fewer than `buffers` entries.
    pub fn with_buffers(buffers: usize) -> Self {
        assert!(buffers > 1);
        Self {
            entries: BTreeMap::new(),
            buffers,
            hits: 0,
            fails: 0,
        }
    }

    /// Create a new handle to an empty cache that can be shared between threads.
    pub fn shared(o: &Options) -> SharedRefCountCache<K, V> {
        Arc::new(Mutex::new(Self::new(o)))
    }

    /// Add an entry with a reference count of one. See [`RefCountCache::add_with_ref_count`].
    pub fn add(&mut self, key: K, value: V) {
        self.add_with_ref_count(key, value, 1);
    }

    /// Add an entry with the given initial reference count.
    ///
    /// If the key is already cached this counts as a use of the existing entry: its reference
    /// count is incremented and `value` is dropped. Otherwise the entry is inserted and entries
    /// are evicted until the cache is below its capacity again, possibly including the new one.
    pub fn add_with_ref_count(&mut self, key: K, value: V, ref_count: u32) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.ref_count = entry.ref_count.saturating_add(1);
            return;
        }

        self.entries.insert(key, Entry { value, ref_count });
        self.shrink();
    }

    /// Look up an entry, counting a use of it.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                entry.ref_count = entry.ref_count.saturating_add(1);
                Some(&entry.value)
            }
            None => {
                self.fails += 1;
                None
            }
        }
    }

    /// Remove an entry regardless of its reference count.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Remove all entries. The hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Change the capacity, evicting entries if the cache is now too full.
    pub fn resize(&mut self, buffers: usize) {
        assert!(buffers > 1);
        self.buffers = buffers;
        self.shrink();
    }

    /// Whether the key is cached. Does not count as a use.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// The current reference count of an entry.
    pub fn ref_count<Q>(&self, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.ref_count)
    }

    /// Iterate the entries in key order without counting uses.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, entry)| (key, &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffers
    }

    /// The number of lookups that found their entry.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// The number of lookups that missed.
    pub fn fails(&self) -> u64 {
        self.fails
    }

    fn shrink(&mut self) {
        while self.entries.len() >= self.buffers {
            if !self.sweep() {
                debug!(len = self.entries.len(), "cache sweep evicted nothing");
            }
        }
    }

    /// Run one eviction sweep. Returns whether an entry was evicted.
    fn sweep(&mut self) -> bool {
        let mut victim = None;
        for (key, entry) in self.entries.iter_mut() {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count < 1 {
                victim = Some(key.clone());
                break;
            }
        }

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                trace!(len = self.entries.len(), "evicted cache entry");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cache: &RefCountCache<&'static str, u32>) -> Vec<&'static str> {
        cache.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn stays_below_capacity() {
        let mut cache = RefCountCache::with_buffers(4);
        for i in 0..5u32 {
            cache.add(i, i * 10);
            assert!(cache.len() < 4);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn re_add_counts_a_use() {
        let mut cache = RefCountCache::with_buffers(4);
        cache.add("a", 1);
        cache.add("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ref_count("a"), Some(2));
        // the cached value is kept
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.ref_count("a"), Some(3));
    }

    #[test]
    fn sweep_gives_used_entries_a_second_chance() {
        let mut cache = RefCountCache::with_buffers(3);
        cache.add("a", 1);
        cache.add("b", 2);
        cache.add("c", 3);
        // "a" is first in key order and had no extra uses, so the sweep stops there
        assert_eq!(keys(&cache), ["b", "c"]);
        assert_eq!(cache.ref_count("b"), Some(1));
        assert_eq!(cache.ref_count("c"), Some(1));

        assert_eq!(cache.get("b"), Some(&2));
        assert_eq!(cache.get("b"), Some(&2));
        cache.add("d", 4);
        // "b" spends a reference, "c" is evicted
        assert_eq!(keys(&cache), ["b", "d"]);
        assert_eq!(cache.ref_count("b"), Some(2));
    }

    #[test]
    fn new_entry_may_be_evicted_first() {
        let mut cache = RefCountCache::with_buffers(3);
        cache.add_with_ref_count("m", 1, 5);
        cache.add_with_ref_count("n", 2, 5);
        cache.add("a", 3);
        assert_eq!(keys(&cache), ["m", "n"]);
    }

    #[test]
    fn zero_initial_ref_count() {
        let mut cache = RefCountCache::with_buffers(3);
        cache.add_with_ref_count("x", 1, 3);
        cache.add_with_ref_count("y", 2, 0);
        cache.add_with_ref_count("z", 3, 3);
        assert_eq!(keys(&cache), ["x", "z"]);
        assert_eq!(cache.ref_count("x"), Some(2));
    }

    #[test]
    fn hits_and_fails() {
        let mut cache = RefCountCache::with_buffers(8);
        cache.add("a", 1);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.fails(), 2);
    }

    #[test]
    fn remove_and_clear() {
        let mut cache = RefCountCache::with_buffers(8);
        cache.add("a", 1);
        cache.add("b", 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        assert!(!cache.contains("a"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn sweeps_repeat_until_an_entry_goes() {
        let mut cache = RefCountCache::with_buffers(3);
        cache.add_with_ref_count("m", 1, 3);
        cache.add_with_ref_count("n", 2, 3);
        assert!(!cache.sweep());
        assert_eq!(cache.ref_count("m"), Some(2));
        assert_eq!(cache.ref_count("n"), Some(2));

        // the first pass evicts nothing, the second one stops at "m"
        cache.add_with_ref_count("z", 3, 4);
        assert_eq!(keys(&cache), ["n", "z"]);
        assert_eq!(cache.ref_count("n"), Some(1));
        assert_eq!(cache.ref_count("z"), Some(3));
    }

    #[test]
    fn resize_evicts() {
        let mut cache = RefCountCache::with_buffers(10);
        for i in 0..9u32 {
            cache.add(i, ());
        }
        assert_eq!(cache.len(), 9);

        cache.resize(4);
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn string_keys_borrowed_lookup() {
        let mut cache: RefCountCache<String, u32> = RefCountCache::new(&Options::new());
        assert_eq!(cache.capacity(), 32);
        cache.add("/db/system".to_string(), 1);
        assert_eq!(cache.get("/db/system"), Some(&1));
    }
}
