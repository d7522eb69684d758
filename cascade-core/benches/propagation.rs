//! Benchmarks for value and event propagation.
//!
//! Run with: cargo bench -p cascade-core -- propagation

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use cascade_core::channel::{EventCell, EventOutput, FloatCell, FloatInput, FloatOutput};

// ---------------------------------------------------------------------------
// 1. Cell write fanned out to many subscribers
// ---------------------------------------------------------------------------

fn bench_cell_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/fan_out");

    for subscribers in [1u64, 16, 256] {
        group.throughput(Throughput::Elements(subscribers));

        let cell = FloatCell::new(0.0);
        let sinks: Vec<FloatCell> = (0..subscribers).map(|_| FloatCell::new(0.0)).collect();
        for sink in &sinks {
            cell.as_input().send(&sink.as_output()).unwrap();
        }

        let mut value = 0.0f32;
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    value += 1.0;
                    cell.set(black_box(value)).unwrap();
                })
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Chains of derived inputs
// ---------------------------------------------------------------------------

fn bench_derived_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/derived_chain");

    for depth in [1usize, 8, 64] {
        let source = FloatCell::new(0.0);
        let mut tail: FloatInput = source.as_input();
        for _ in 0..depth {
            tail = tail.plus(1.0);
        }
        let sink = FloatCell::new(0.0);
        tail.send(&sink.as_output()).unwrap();

        let mut value = 0.0f32;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                value += 1.0;
                source.set(black_box(value)).unwrap();
                black_box(sink.get())
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Combined outputs and events
// ---------------------------------------------------------------------------

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/combine");

    let targets: Vec<FloatCell> = (0..8).map(|_| FloatCell::new(0.0)).collect();
    let combined = FloatOutput::combine(targets.iter().map(FloatCell::as_output));
    let mut value = 0.0f32;
    group.bench_function("float_x8", |b| {
        b.iter(|| {
            value += 1.0;
            combined.set(black_box(value)).unwrap();
        })
    });

    let events: Vec<EventCell> = (0..8).map(|_| EventCell::new()).collect();
    let combined = EventOutput::combine(events.iter().map(EventCell::as_output));
    group.bench_function("event_x8", |b| b.iter(|| combined.event().unwrap()));

    group.finish();
}

criterion_group!(benches, bench_cell_fan_out, bench_derived_chain, bench_combine);
criterion_main!(benches);
