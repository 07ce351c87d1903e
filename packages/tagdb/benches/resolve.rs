//! Benchmark suite for path resolution
//!
//! Covers:
//! - Query: query_by_tags (single tag, intersection)
//! - Listing: resolve as directory with and without collision groups
//! - Lookup: resolve as unsure (file and directory interpretations)
//! - Mutation: create with scope validation
//!
//! Run: cargo bench --bench resolve

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tagdb::{Catalog, FileId, Tag, Target};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `file_count` files spread over 20 tags, three tags each. Every tenth file
/// shares the name "dup" so listings contain collision groups.
fn build_catalog(file_count: usize) -> Catalog {
    let mut catalog = Catalog::new();
    for i in 0..file_count {
        let name = if i % 10 == 0 {
            "dup".to_string()
        } else {
            format!("file_{}.txt", i)
        };
        let tags: Vec<Tag> = vec![
            format!("t{}", i % 20),
            format!("t{}", (i / 20) % 20),
            format!("u{}", i),
        ];
        catalog
            .create(FileId(i as u128 + 1), &name, &tags)
            .expect("benchmark catalog must be valid");
    }
    catalog
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_query_by_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_by_tags");
    for size in [1_000, 10_000] {
        let catalog = build_catalog(size);
        group.bench_with_input(BenchmarkId::new("single", size), &catalog, |b, catalog| {
            b.iter(|| catalog.query_by_tags(black_box(&["t3"])).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("pair", size), &catalog, |b, catalog| {
            b.iter(|| catalog.query_by_tags(black_box(&["t3", "t7"])).unwrap());
        });
    }
    group.finish();
}

fn bench_resolve_dir(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_dir");
    for size in [1_000, 10_000] {
        let catalog = build_catalog(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &catalog, |b, catalog| {
            b.iter(|| catalog.resolve(black_box("/t0"), Target::Dir).unwrap());
        });
    }
    group.finish();
}

fn bench_resolve_unsure(c: &mut Criterion) {
    let catalog = build_catalog(10_000);
    let mut group = c.benchmark_group("resolve_unsure");
    group.bench_function("file", |b| {
        b.iter(|| catalog.resolve(black_box("/t1/t0/file_1.txt"), Target::Unsure).unwrap());
    });
    group.bench_function("directory", |b| {
        b.iter(|| catalog.resolve(black_box("/t1/t0"), Target::Unsure).unwrap());
    });
    group.finish();
}

fn bench_create(c: &mut Criterion) {
    let base = build_catalog(5_000);
    c.bench_function("create_validated", |b| {
        b.iter_batched(
            || base.clone(),
            |mut catalog| {
                catalog
                    .create(FileId(u128::MAX), "fresh.txt", &["t1".to_string(), "t2".to_string()])
                    .unwrap();
                catalog
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_query_by_tags,
    bench_resolve_dir,
    bench_resolve_unsure,
    bench_create,
);
criterion_main!(benches);
