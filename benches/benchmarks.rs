use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use larder::{DbStore, LocalStore, MemoryDatabase, MemoryStorage, Signal};

fn signal_write_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(0);

    c.bench_function("signal_write", |b| {
        let mut i = 0;
        b.iter(|| {
            signal.set(black_box(i));
            i += 1;
        });
    });
}

fn local_store_read_benchmark(c: &mut Criterion) {
    let store = LocalStore::new("theme", "light".to_string(), MemoryStorage::new());

    c.bench_function("local_store_read", |b| {
        b.iter(|| {
            black_box(store.get());
        });
    });
}

fn local_store_write_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_store_write");

    for len in [1usize, 100, 10_000].iter() {
        let store = LocalStore::new("history", Vec::<u64>::new(), MemoryStorage::new());
        let payload: Vec<u64> = (0..*len as u64).collect();

        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                store.set(black_box(payload.clone()));
            });
        });
    }
    group.finish();
}

fn db_store_write_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let _guard = runtime.enter();
    let store = DbStore::new("query", String::new(), MemoryDatabase::new());

    c.bench_function("db_store_write_flush", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.set(format!("select {}", black_box(i)));
            runtime.block_on(store.flush());
            i += 1;
        });
    });
}

criterion_group!(
    benches,
    signal_write_benchmark,
    local_store_read_benchmark,
    local_store_write_benchmark,
    db_store_write_benchmark,
);
criterion_main!(benches);
