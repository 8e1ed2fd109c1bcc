use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{DateTime, Utc};
use gestor_events::ChangeKind;
use gestor_pricing::{PriceItem, reconcile::reconcile_batch};

fn item(n: usize) -> PriceItem {
    let mut item = PriceItem::new(format!("item-{n:06}"), format!("Serviço {n}"), n as f64);
    item.created_at = DateTime::<Utc>::from_timestamp_millis(n as i64 * 1_000);
    item
}

/// Loaded list of `size` items delivered in reverse creation order.
fn loaded(size: usize) -> Vec<PriceItem> {
    let mut items = Vec::with_capacity(size);
    reconcile_batch(
        &mut items,
        (0..size).rev().map(|n| (ChangeKind::Added, item(n))),
    );
    items
}

fn bench_initial_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_snapshot");

    for size in [100usize, 1_000, 5_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let changes: Vec<_> = (0..size)
                .rev()
                .map(|n| (ChangeKind::Added, item(n)))
                .collect();
            b.iter(|| {
                let mut items = Vec::with_capacity(size);
                reconcile_batch(&mut items, black_box(changes.clone()));
                items
            });
        });
    }

    group.finish();
}

fn bench_single_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_delta");

    for size in [100usize, 1_000, 5_000] {
        let base = loaded(size);

        group.bench_with_input(BenchmarkId::new("modified", size), &size, |b, &size| {
            let mut edited = item(size / 2);
            edited.name = "Editado".to_string();
            b.iter_batched(
                || base.clone(),
                |mut items| {
                    reconcile_batch(&mut items, [(ChangeKind::Modified, black_box(edited.clone()))]);
                    items
                },
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("duplicate_added", size), &size, |b, &size| {
            let duplicate = item(size - 1);
            b.iter_batched(
                || base.clone(),
                |mut items| {
                    reconcile_batch(&mut items, [(ChangeKind::Added, black_box(duplicate.clone()))]);
                    items
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_initial_snapshot, bench_single_delta);
criterion_main!(benches);
