#![cfg(feature = "benchmarks")]

use criterion::{BenchmarkId, Criterion};

use crate::{buffer_pool::byte_pool, varint, LockFreeStack, RefCountCache};

pub fn primitives_benchmark(c: &mut Criterion) {
    varint_benchmark(c);
    buffer_pool_benchmark(c);
    stack_benchmark(c);
    cache_benchmark(c);
}

fn varint_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");
    for x in [1u64, 300, 1 << 30, u64::MAX] {
        let encoded = varint::encode_to_vec(x);
        group.bench_with_input(BenchmarkId::new("encode", x), &x, |b, x| {
            let mut out = Vec::with_capacity(varint::MAX_ENCODED_SIZE);
            b.iter(|| {
                out.clear();
                varint::encode(*x, &mut out);
            })
        });
        group.bench_with_input(BenchmarkId::new("decode", x), &encoded, |b, encoded| {
            b.iter(|| {
                let mut offset = 0;
                varint::decode(encoded, &mut offset)
            })
        });
    }
    group.finish();
}

fn buffer_pool_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool");
    group.bench_function("acquire_release", |b| {
        let pool = byte_pool();
        b.iter(|| {
            let buf = pool.acquire(64);
            pool.release(buf);
        })
    });
    group.bench_function("allocate", |b| b.iter(|| vec![0u8; 64].into_boxed_slice()));
    group.finish();
}

fn stack_benchmark(c: &mut Criterion) {
    let stack = LockFreeStack::new();
    c.bench_function("lock_free_stack_push_pop", |b| {
        b.iter(|| {
            stack.push(1u64);
            stack.pop()
        })
    });
}

fn cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("refcount_cache");
    group.bench_function("add_evict", |b| {
        let mut cache = RefCountCache::with_buffers(32);
        let mut i = 0u64;
        b.iter(|| {
            cache.add(i, i);
            i += 1;
        })
    });
    group.bench_function("get_hit", |b| {
        let mut cache = RefCountCache::with_buffers(32);
        for i in 0..16u64 {
            cache.add(i, i);
        }
        b.iter(|| cache.get(&7).copied())
    });
    group.finish();
}
