//! Benchmarks for the rewrite engine.
//!
//! - Parsing and emitting a class image unchanged
//! - Rewriting an image without a static initializer
//! - Rewriting an image whose static initializer gets prefixed

extern crate bundleweave;

use bundleweave::{classfile::ClassFile, config::TransformConfig, rewrite::RewriteEngine};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

#[path = "../tests/common/mod.rs"]
mod common;

/// Benchmark parsing followed by emitting, without changes.
fn bench_codec_round_trip(c: &mut Criterion) {
    let image = common::bundle_image(61, true).unwrap();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(image.len() as u64));
    group.bench_function("parse_and_emit", |b| {
        b.iter(|| {
            let class = ClassFile::parse(black_box(&image)).unwrap();
            black_box(class.to_bytes().unwrap())
        });
    });
    group.finish();
}

/// Benchmark the full rewrite, with and without an existing static initializer.
fn bench_rewrite(c: &mut Criterion) {
    let engine = RewriteEngine::new(
        TransformConfig::default()
            .with_pattern("[$base|$locale] $value")
            .with_includes(["com.acme.", "org.acme."]),
    );

    for (name, static_init) in [("rewrite_created", false), ("rewrite_augmented", true)] {
        let image = common::bundle_image(61, static_init).unwrap();

        let mut group = c.benchmark_group(name);
        group.throughput(Throughput::Bytes(image.len() as u64));
        group.bench_function("transform", |b| {
            b.iter(|| black_box(engine.transform(black_box(&image)).unwrap()));
        });
        group.finish();
    }
}

criterion_group!(benches, bench_codec_round_trip, bench_rewrite);
criterion_main!(benches);
