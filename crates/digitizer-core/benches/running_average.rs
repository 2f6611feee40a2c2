//! Criterion benchmarks for the watchdog's running average and trigger scan.
//!
//! Run with: cargo bench -p digitizer-core --bench running_average

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use digitizer_core::{RunningAverageFilter, TriggerDetector, TriggerDirection};

fn running_average_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("running_average_add");
    for window in [100usize, 10_000, 100_000] {
        let mut filter = RunningAverageFilter::new(window);
        filter.seed(1e6);
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, _| {
            let mut x = 0.0f64;
            b.iter(|| {
                x += 1.0;
                black_box(filter.add(black_box(x)))
            });
        });
    }
    group.finish();
}

fn analog_edge_scan(c: &mut Criterion) {
    let samples: Vec<f32> = (0..8192).map(|i| ((i as f32) * 0.01).sin()).collect();
    let mut group = c.benchmark_group("analog_edge_scan");
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("8192", |b| {
        let mut detector = TriggerDetector::new();
        b.iter(|| {
            black_box(detector.find_analog_edges(
                black_box(&samples),
                0.0,
                0.02,
                TriggerDirection::Rising,
            ))
        });
    });
    group.finish();
}

criterion_group!(benches, running_average_add, analog_edge_scan);
criterion_main!(benches);
