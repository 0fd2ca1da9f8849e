mod common;

use std::{collections::BTreeSet, thread};

use quickcheck::{QuickCheck, TestResult};
use xstore::{Options, RefCountCache};

#[test]
fn one_more_key_than_capacity() {
    common::init_tracing();
    let mut o = Options::new();
    o.cache_buffers(8);
    let mut cache = RefCountCache::new(&o);

    for i in 0..9u32 {
        cache.add(i, format!("collection {i}"));
        assert!(cache.len() < 8);
    }
    // the newest key always has a reference left when the sweep reaches it
    assert!(cache.contains(&8));
    assert_eq!(cache.get(&8).map(String::as_str), Some("collection 8"));
}

#[test]
fn frequently_used_entry_survives() {
    let mut cache = RefCountCache::with_buffers(4);
    cache.add(0u32, ());
    for i in 1..100u32 {
        assert!(cache.get(&0).is_some(), "hot entry evicted before key {i}");
        cache.add(i, ());
    }
    assert_eq!(cache.hits(), 99);
}

#[test]
fn shared_between_threads() {
    let mut o = Options::new();
    o.cache_buffers(16);
    let cache = RefCountCache::<u32, u32>::shared(&o);

    thread::scope(|s| {
        for t in 0..4u32 {
            let cache = cache.clone();
            s.spawn(move || {
                for i in 0..250 {
                    let key = t * 1000 + i;
                    let mut cache = cache.lock();
                    cache.add(key, key * 2);
                    if let Some(v) = cache.get(&key) {
                        assert_eq!(*v, key * 2);
                    }
                    assert!(cache.len() < 16);
                }
            });
        }
    });

    let cache = cache.lock();
    assert!(cache.len() < 16);
    assert_eq!(cache.hits() + cache.fails(), 1000);
}

#[test]
fn capacity_is_never_reached() {
    fn prop(buffers: u8, ops: Vec<(bool, u8)>) -> TestResult {
        if buffers < 2 {
            return TestResult::discard();
        }
        let mut cache = RefCountCache::with_buffers(buffers as usize);
        let mut ever_added = BTreeSet::new();
        for (is_get, key) in ops {
            if is_get {
                let _ = cache.get(&key);
            } else {
                cache.add(key, key);
                ever_added.insert(key);
            }
            if cache.len() >= buffers as usize {
                return TestResult::failed();
            }
        }
        let only_known = cache
            .iter()
            .all(|(k, v)| k == v && ever_added.contains(k));
        TestResult::from_bool(only_known)
    }

    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(u8, Vec<(bool, u8)>) -> TestResult);
}
