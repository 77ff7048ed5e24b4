// Criterion benchmarks for msgrpc-metrics
//
// Run benchmarks with:
//   cargo bench -p msgrpc-metrics

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use msgrpc_metrics::{MetricsCollector, MetricsConfig, ServerMetricsCollector};
use std::sync::Arc;
use std::time::Instant;

fn bench_record_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_call");

    let collector = ServerMetricsCollector::new();

    group.bench_function("single_method", |b| {
        b.iter(|| {
            collector.record_call(black_box("add"), black_box(Instant::now()), black_box(true));
        });
    });

    let methods = ["method_a", "method_b", "method_c", "method_d", "method_e"];
    group.bench_function("five_methods", |b| {
        b.iter(|| {
            for method in &methods {
                collector.record_call(black_box(method), black_box(Instant::now()), black_box(true));
            }
        });
    });

    let full = ServerMetricsCollector::with_config(MetricsConfig { max_methods: 1 });
    full.record_call("tracked", Instant::now(), true);
    group.bench_function("untracked_method", |b| {
        b.iter(|| {
            full.record_call(black_box("overflow"), black_box(Instant::now()), black_box(true));
        });
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    let collector = ServerMetricsCollector::new();
    for i in 0..100 {
        let method = format!("method_{}", i % 10);
        collector.record_call(&method, Instant::now(), i % 2 == 0);
    }

    group.bench_function("snapshot_10_methods", |b| {
        b.iter(|| collector.snapshot());
    });

    group.bench_function("metrics_builtin_10_methods", |b| {
        b.iter(|| collector.handle_builtin(black_box("_metrics"), &[]));
    });

    group.finish();
}

fn bench_concurrent_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    group.bench_function("4_threads_x_100_calls", |b| {
        b.iter(|| {
            let collector = Arc::new(ServerMetricsCollector::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let collector = Arc::clone(&collector);
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            collector.record_call(if t % 2 == 0 { "even" } else { "odd" }, Instant::now(), true);
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_record_call, bench_snapshot, bench_concurrent_recording);
criterion_main!(benches);
