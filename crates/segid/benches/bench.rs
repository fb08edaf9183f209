use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::try_join_all;
use segid::{AllocatorConfig, Claim, MemoryRangeStore, Result, Segment, SegmentAllocator};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::{Builder, Runtime};

// Number of IDs claimed per benchmark iteration (split across threads/tasks
// for the contended variants).
const TOTAL_IDS: usize = 4096;

fn multi_thread_runtime() -> Runtime {
    Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get())
        .build()
        .unwrap()
}

/// Benchmarks the raw claim path on a segment large enough never to run out.
fn bench_segment_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment/claim");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let segment = Segment::new(1, TOTAL_IDS as i64);
                for _ in 0..TOTAL_IDS {
                    match segment.claim() {
                        Claim::Ready { id } => {
                            black_box(id);
                        }
                        Claim::Exhausted => unreachable!(),
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks one segment shared across threads.
fn bench_segment_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment/contended");

    for thread_count in [1, 2, 4, 8, 16] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let segment = Arc::new(Segment::new(1, TOTAL_IDS as i64));
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let segment = Arc::clone(&segment);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(segment.claim());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks a single allocator on one Tokio thread. Small steps force
/// frequent segment switches; large steps stay on the fast path.
fn bench_allocator_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for step in [64, 1000, 100_000] {
        group.bench_function(format!("elems/{}/step/{}", TOTAL_IDS, step), |b| {
            let rt = Builder::new_multi_thread()
                .enable_all()
                .worker_threads(1)
                .build()
                .unwrap();

            b.to_async(&rt).iter_custom(|iters| async move {
                let config = AllocatorConfig::new("bench").with_step(step);
                let allocator = SegmentAllocator::new(MemoryRangeStore::new(), config)
                    .await
                    .unwrap();
                let start = Instant::now();

                for _ in 0..iters {
                    for _ in 0..TOTAL_IDS {
                        black_box(allocator.next_id().await.unwrap());
                    }
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

/// Benchmarks one allocator shared by many tasks.
fn bench_allocator_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator/contended");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);

    let total_ids = TOTAL_IDS * 64;

    for num_tasks in [1, 4, 16, 64, 256] {
        let ids_per_task = total_ids / num_tasks;

        group.throughput(Throughput::Elements(total_ids as u64));
        group.bench_function(format!("elems/{}/tasks/{}", total_ids, num_tasks), |b| {
            let rt = multi_thread_runtime();

            b.to_async(&rt).iter_custom(move |iters| async move {
                let allocator = Arc::new(
                    SegmentAllocator::new(MemoryRangeStore::new(), AllocatorConfig::new("bench"))
                        .await
                        .unwrap(),
                );
                let start = Instant::now();

                for _ in 0..iters {
                    let mut tasks: Vec<tokio::task::JoinHandle<Result<()>>> =
                        Vec::with_capacity(num_tasks);

                    for _ in 0..num_tasks {
                        let allocator = Arc::clone(&allocator);
                        tasks.push(tokio::spawn(async move {
                            for _ in 0..ids_per_task {
                                black_box(allocator.next_id().await?);
                            }
                            Ok(())
                        }));
                    }

                    for result in try_join_all(tasks).await.unwrap() {
                        result.unwrap();
                    }
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_segment_claim,
    bench_segment_contended,
    bench_allocator_sequential,
    bench_allocator_contended,
);
criterion_main!(benches);
