//! Benchmarks for deep merge
//!
//! Tests performance of combining provider records of increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metaforged::merge::{merge, merge_all, MergePolicy};
use metaforged_common::Record;

/// A movie record with `width` genres, cast members and art entries.
fn provider_record(source: &str, width: usize) -> Record {
    let genres: Vec<String> = (0..width).map(|i| format!("genre-{}", i % 7)).collect();
    let cast: Vec<Record> = (0..width)
        .map(|i| {
            Record::new()
                .with("name", format!("Actor {i}"))
                .with("role", format!("Role {i}"))
        })
        .collect();
    let mut art = Record::new();
    for i in 0..width {
        art.insert(format!("{source}-art-{i}"), format!("https://img/{source}/{i}.jpg"));
    }

    Record::new()
        .with("title", format!("Title from {source}"))
        .with("year", 1999)
        .with("rating", 8.1)
        .with("genre", genres)
        .with(
            "cast",
            metaforged_common::Value::List(cast.into_iter().map(Into::into).collect()),
        )
        .with("art", art)
}

fn bench_pairwise_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_pair");
    let policy = MergePolicy::new().allow_overwrite("rating");

    for width in [4usize, 32, 256] {
        let base = provider_record("tmdb", width);
        let addition = provider_record("fanarttv", width);
        group.bench_with_input(BenchmarkId::new("width", width), &width, |b, _| {
            b.iter(|| merge(black_box(&base), black_box(&addition), &policy))
        });
    }
    group.finish();
}

fn bench_chain_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_chain");
    let policy = MergePolicy::new();
    let sources = ["local", "tmdb", "omdb", "fanarttv", "imdb", "tvdb"];
    let records: Vec<Record> = sources.iter().map(|s| provider_record(s, 32)).collect();

    group.bench_function("six_providers", |b| {
        b.iter(|| merge_all(black_box(records.iter()), &policy))
    });
    group.bench_function("idempotent_remerge", |b| {
        let merged = merge_all(records.iter(), &policy);
        b.iter(|| merge(black_box(&merged), black_box(&merged), &policy))
    });
    group.finish();
}

criterion_group!(benches, bench_pairwise_merge, bench_chain_merge);
criterion_main!(benches);
