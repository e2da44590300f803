//! Benchmark for the storage manager: lazy values and memoized functions.
//!
//! Measures the lock-free cached path against the locked first computation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lockmemo::storage::StorageManager;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Lazy Value Benchmarks
// =============================================================================

fn benchmark_lazy_value_first_invoke(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("lazy_value_first_invoke");
    let manager = StorageManager::new("bench");

    group.bench_function("create_and_invoke", |bencher| {
        bencher.iter(|| {
            let value = manager.create_lazy_value(|| Ok((0..100).sum::<u64>()));
            black_box(value.invoke())
        });
    });

    group.bench_function("create_and_invoke_nullable", |bencher| {
        bencher.iter(|| {
            let value = manager.create_nullable_lazy_value(|| Ok(Some((0..100).sum::<u64>())));
            black_box(value.invoke())
        });
    });

    group.finish();
}

fn benchmark_lazy_value_cached(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("lazy_value_cached");
    let manager = StorageManager::new("bench");

    let value = manager.create_lazy_value(|| Ok((0..1000).sum::<u64>()));
    let _ = value.invoke();

    // Hot path: no lock is taken
    group.bench_function("cached_access", |bencher| {
        bencher.iter(|| black_box(value.invoke()));
    });

    let shared = manager.create_lazy_value(|| Ok(Arc::new(vec![0_u8; 4096])));
    let _ = shared.invoke();

    group.bench_function("cached_access_arc", |bencher| {
        bencher.iter(|| black_box(shared.invoke()));
    });

    group.finish();
}

fn benchmark_lazy_value_dependency_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("lazy_value_dependency_chain");

    for depth in [10, 100] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |bencher, &depth| {
            bencher.iter(|| {
                let manager = StorageManager::new("chain");
                let mut current = manager.create_lazy_value(|| Ok(0_u64));
                for _ in 0..depth {
                    let previous = current.clone();
                    current = manager.create_lazy_value(move || Ok(previous.invoke()? + 1));
                }
                black_box(current.invoke())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Memoized Function Benchmarks
// =============================================================================

fn benchmark_memoized_function(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("memoized_function");

    for keys in [16_u64, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("cold_keys", keys), &keys, |bencher, &keys| {
            bencher.iter(|| {
                let manager = StorageManager::new("memoized");
                let function = manager.create_memoized_function(|key: &u64| Ok(key * 2));
                for key in 0..keys {
                    let _ = black_box(function.invoke(key));
                }
            });
        });
    }

    let manager = StorageManager::new("memoized");
    let function = manager.create_memoized_function(|key: &u64| Ok(key * 2));
    for key in 0..256 {
        let _ = function.invoke(key);
    }

    group.bench_function("cached_key", |bencher| {
        bencher.iter(|| black_box(function.invoke(black_box(128))));
    });

    group.finish();
}

fn benchmark_concurrent_cached_reads(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("concurrent_cached_reads");
    let manager = StorageManager::new("concurrent");
    let value = manager.create_lazy_value(|| Ok(42_u64));
    let _ = value.invoke();

    for threads in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |bencher, &threads| {
            bencher.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let value = value.clone();
                        thread::spawn(move || {
                            for _ in 0..1000 {
                                let _ = black_box(value.invoke());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lazy_value_first_invoke,
    benchmark_lazy_value_cached,
    benchmark_lazy_value_dependency_chain,
    benchmark_memoized_function,
    benchmark_concurrent_cached_reads,
);

criterion_main!(benches);
