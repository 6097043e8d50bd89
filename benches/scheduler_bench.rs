//! Benchmarks for scheduling overhead.
//!
//! Benchmarks cover:
//! - Direct submission round trips on the immediate and pooled schedulers
//! - Worker lane throughput on a multi-threaded pool
//! - Dispose cost for pending delayed tasks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_channel::unbounded;
use std::hint::black_box;
use std::time::Duration;

use prometheus_scheduler::core::schedulers;
use prometheus_scheduler::{Disposable, Scheduler};

// ============================================================================
// Direct Submission
// ============================================================================

fn bench_immediate_schedule(c: &mut Criterion) {
    let scheduler = schedulers::immediate();
    c.bench_function("immediate_schedule", |b| {
        b.iter(|| {
            let handle = scheduler.schedule(Box::new(|| {
                black_box(1 + 1);
            }));
            black_box(handle);
        });
    });
}

fn bench_pool_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_schedule");

    for threads in [1_usize, 4] {
        let scheduler = schedulers::parallel(threads).unwrap();
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let (tx, rx) = unbounded();
                for _ in 0..1_000 {
                    let tx = tx.clone();
                    let _ = scheduler.schedule(Box::new(move || {
                        let _ = tx.send(());
                    }));
                }
                for _ in 0..1_000 {
                    let _ = rx.recv_timeout(Duration::from_secs(5));
                }
            });
        });
        scheduler.dispose();
    }
    group.finish();
}

// ============================================================================
// Worker Lanes
// ============================================================================

fn bench_worker_lane(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_lane");
    let scheduler = schedulers::parallel(4).unwrap();

    for lanes in [1_usize, 4] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(lanes), &lanes, |b, &lanes| {
            let workers: Vec<_> = (0..lanes).map(|_| scheduler.create_worker()).collect();
            b.iter(|| {
                let (tx, rx) = unbounded();
                for n in 0..1_000 {
                    let tx = tx.clone();
                    let _ = workers[n % lanes].schedule(Box::new(move || {
                        let _ = tx.send(());
                    }));
                }
                for _ in 0..1_000 {
                    let _ = rx.recv_timeout(Duration::from_secs(5));
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Dispose
// ============================================================================

fn bench_dispose_pending_delayed(c: &mut Criterion) {
    let scheduler = schedulers::single().unwrap();
    c.bench_function("dispose_pending_delayed", |b| {
        b.iter(|| {
            let handle = scheduler.schedule_delayed(Box::new(|| {}), Duration::from_secs(60));
            handle.dispose();
            black_box(handle.is_disposed());
        });
    });
}

criterion_group!(
    benches,
    bench_immediate_schedule,
    bench_pool_schedule,
    bench_worker_lane,
    bench_dispose_pending_delayed,
);
criterion_main!(benches);
