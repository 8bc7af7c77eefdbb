//! Benchmarks for bridged reads: cache hits against reads after invalidation.
//!
//! Run with: cargo bench -p tether-core -- cache

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use tether_core::kv::{KeyValueBridge, KeyValueStore, MemoryStore, StoreValue};
use tether_core::notify::Notifier;
use tether_core::query::{ContextChange, Entity, EntityType, MemoryContext, QueryBridge, SortOrder};

#[derive(Clone, Debug)]
struct Row {
    rank: u64,
}

impl Entity for Row {
    const ENTITY_NAME: &'static str = "Row";
}

// ---------------------------------------------------------------------------
// Key-value bridge
// ---------------------------------------------------------------------------

fn bench_key_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/key_value");

    let store = Arc::new(MemoryStore::new());
    store.set_value("name", Some(StoreValue::String("benchmark".into())));
    let bridge = KeyValueBridge::new(store.clone(), "name", String::new());

    group.bench_function("hit", |b| {
        bridge.get();
        b.iter(|| black_box(bridge.get()))
    });

    group.bench_function("after_write", |b| {
        b.iter(|| {
            store.set_value("name", Some(StoreValue::String("benchmark".into())));
            black_box(bridge.get())
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Query bridge
// ---------------------------------------------------------------------------

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/query");

    for count in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count));

        let bus = Notifier::shared();
        let context = Arc::new(MemoryContext::with_changes(bus.clone()));
        for i in 0..count {
            context.insert(Row {
                rank: i.wrapping_mul(6364136223846793005) % count,
            });
        }
        let bridge: QueryBridge<Row> = QueryBridge::builder()
            .filter(|row: &Row| row.rank % 2 == 0)
            .sort_by_key(|row: &Row| row.rank, SortOrder::Forward)
            .context(context.clone())
            .changes(bus.clone())
            .build()
            .expect("bridge without conflicting envelope");

        group.bench_with_input(BenchmarkId::new("hit", count), &(), |b, _| {
            bridge.results();
            b.iter(|| black_box(bridge.results().len()))
        });

        let change = ContextChange::Entity(EntityType::of::<Row>());
        group.bench_with_input(BenchmarkId::new("after_change", count), &(), |b, _| {
            b.iter(|| {
                bus.emit(&change);
                black_box(bridge.results().len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_value, bench_query);
criterion_main!(benches);
