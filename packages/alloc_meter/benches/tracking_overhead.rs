//! Benchmarks to measure the compute overhead of `alloc_meter` logic itself.
//!
//! The counters are updated on every allocation of the process, so their cost is paid
//! everywhere while a measurement window is open.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use alloc_meter::{Allocator, Tracker};
use criterion::{Criterion, criterion_group, criterion_main};

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_meter_overhead");

    group.bench_function("record_allocate", |b| {
        let tracker = Tracker::new();
        b.iter(|| tracker.record_allocate(black_box(64)));
    });

    group.bench_function("record_allocate_then_free", |b| {
        let tracker = Tracker::new();
        b.iter(|| {
            tracker.record_allocate(black_box(64));
            tracker.record_free(black_box(64));
        });
    });

    group.bench_function("box_inactive", |b| {
        b.iter(|| black_box(Box::new(black_box(42_u64))));
    });

    ALLOCATOR
        .tracker()
        .activate()
        .expect("benchmark is the only user of the tracker");

    group.bench_function("box_active", |b| {
        b.iter(|| black_box(Box::new(black_box(42_u64))));
    });

    ALLOCATOR.tracker().deactivate();

    group.finish();
}
