// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Slab cache benchmarks.
//
// Run with:
//   cargo bench --bench slab
//
// Groups:
//   global_vs_cache_64   — Vec<u8> via the global allocator vs. Cache::alloc/free, 64-byte objects
//   global_vs_cache_1024 — same comparison at 1024 bytes
//   slab_pool            — SlabPool::get_len/put across in-range and out-of-range sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use slabcache::{Cache, SlabPool};

fn bench_global_vs_cache(c: &mut Criterion, group_name: &str, size: usize) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function("global_alloc", |b| {
        b.iter(|| {
            let v: Vec<u8> = vec![0xABu8; size];
            black_box(v)
        });
    });

    group.bench_function("cache_alloc_free", |b| {
        let cache = Cache::new(size, None);
        b.iter(|| {
            let mut buf = cache.alloc();
            buf[0] = 0xAB;
            black_box(&*buf);
            cache.free(buf);
        });
    });

    group.finish();
}

fn bench_cache_64(c: &mut Criterion) {
    bench_global_vs_cache(c, "global_vs_cache_64", 64);
}

fn bench_cache_1024(c: &mut Criterion) {
    bench_global_vs_cache(c, "global_vs_cache_1024", 1024);
}

fn bench_slab_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab_pool");
    let pool = SlabPool::new(64, 4096);

    for &(label, size) in &[("in_range_256", 256usize), ("out_of_range_8192", 8192)] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &sz| {
            b.iter(|| {
                let buf = pool.get_len(sz);
                black_box(&*buf);
                pool.put(buf);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_64, bench_cache_1024, bench_slab_pool);
criterion_main!(benches);
