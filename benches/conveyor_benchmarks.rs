use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use brickyard::conveyor::{Conveyor, Removal};
use brickyard::prelude::*;
use tokio_util::sync::CancellationToken;

fn conveyor(max_count: usize) -> Arc<Conveyor> {
    let coordinator = Arc::new(ShutdownCoordinator::with_workers([WorkerId(1)]));
    Arc::new(Conveyor::new(max_count, 3 * max_count as u64, coordinator).unwrap())
}

fn bench_offer_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("offer_remove");

    for size in [100usize, 1000, 5000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("fill_then_drain", size), size, |b, &size| {
            let brick = Brick::new(2).unwrap();
            b.iter(|| {
                let conveyor = conveyor(size);
                for _ in 0..size {
                    assert!(conveyor.try_offer(black_box(brick)).unwrap());
                }
                while let Some(Removal::Brick(b)) = conveyor.try_remove(3).unwrap() {
                    black_box(b);
                }
            });
        });
    }

    group.finish();
}

fn bench_contended_yard(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_yard");
    group.sample_size(10);

    for trucks in [1u32, 3, 8].iter() {
        group.bench_with_input(BenchmarkId::new("trucks", trucks), trucks, |b, &trucks| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let conveyor = conveyor(10);
                    let stop = CancellationToken::new();
                    let worker = Worker::new(WorkerId(1), 1, conveyor.clone()).unwrap();
                    let producing = tokio::spawn(worker.run(stop.clone()));

                    let handles: Vec<_> = (1..=trucks)
                        .map(|t| {
                            let truck =
                                Truck::new(TruckId(t), 5, conveyor.clone(), TallySink::new())
                                    .unwrap()
                                    .delivery_interval(Duration::ZERO)
                                    .retry_backoff(Duration::ZERO);
                            tokio::spawn(truck.run())
                        })
                        .collect();

                    tokio::time::sleep(Duration::from_millis(5)).await;
                    stop.cancel();
                    producing.await.unwrap().unwrap();
                    for handle in handles {
                        black_box(handle.await.unwrap().unwrap());
                    }
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_offer_remove, bench_contended_yard);
criterion_main!(benches);
