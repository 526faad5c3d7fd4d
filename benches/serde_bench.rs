//! Benchmark for serde serialization/deserialization of PersistentVector.
//!
//! Compares radixvec's PersistentVector against the standard Vec, then
//! measures a four-level tree and a version derived from it by update/pop.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use radixvec::persistent::PersistentVector;
use std::hint::black_box;

// =============================================================================
// PersistentVector vs Vec - Serialize
// =============================================================================

fn benchmark_vector_serialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_serialize_vector");

    for size in [100, 1000, 10000] {
        let persistent_vector: PersistentVector<i32> = (0..size).collect();
        let standard_vec: Vec<i32> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let json = serde_json::to_string(&persistent_vector).unwrap();
                    black_box(json)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, _| {
            bencher.iter(|| {
                let json = serde_json::to_string(&standard_vec).unwrap();
                black_box(json)
            });
        });
    }

    group.finish();
}

// =============================================================================
// PersistentVector vs Vec - Deserialize
// =============================================================================

fn benchmark_vector_deserialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_deserialize_vector");

    for size in [100, 1000, 10000] {
        let standard_vec: Vec<i32> = (0..size).collect();
        let json = serde_json::to_string(&standard_vec).unwrap();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &json,
            |bencher, json| {
                bencher.iter(|| {
                    let vector: PersistentVector<i32> = serde_json::from_str(json).unwrap();
                    black_box(vector)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &json, |bencher, json| {
            bencher.iter(|| {
                let vector: Vec<i32> = serde_json::from_str(json).unwrap();
                black_box(vector)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Deep tree and derived versions
// =============================================================================

/// 32^3 + 1 elements: the smallest vector with four levels.
const DEEP_TREE_LENGTH: usize = 32 * 32 * 32 + 1;

fn benchmark_deep_tree(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_deep_tree");

    let deep: PersistentVector<usize> = (0..DEEP_TREE_LENGTH).collect();
    let derived = deep
        .update(DEEP_TREE_LENGTH / 2, 0)
        .and_then(|vector| vector.pop())
        .unwrap();
    let json = serde_json::to_string(&deep).unwrap();

    group.bench_function("serialize_four_levels", |bencher| {
        bencher.iter(|| black_box(serde_json::to_string(&deep).unwrap()));
    });

    group.bench_function("serialize_derived_version", |bencher| {
        bencher.iter(|| black_box(serde_json::to_string(&derived).unwrap()));
    });

    group.bench_function("deserialize_four_levels", |bencher| {
        bencher.iter(|| {
            let vector: PersistentVector<usize> = serde_json::from_str(black_box(&json)).unwrap();
            black_box(vector.height())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_vector_serialize,
    benchmark_vector_deserialize,
    benchmark_deep_tree
);

criterion_main!(benches);
