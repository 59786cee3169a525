//! Benchmarks for replikv apply and read paths

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use replikv::{Entry, LocalLog, Mutation, Operation, ReadOptions, ReplicatedState};

fn open() -> ReplicatedState {
    let config = replikv::Config::builder().instance_id("bench").build();
    ReplicatedState::open(config, Arc::new(LocalLog::new(true))).unwrap()
}

fn entries(count: u64) -> Vec<Entry> {
    (1..=count)
        .map(|i| {
            let batch = vec![Mutation::put(format!("key{:06}", i % 1000), vec![0u8; 64])];
            Entry::new(i, 1, Operation::Write(batch))
        })
        .collect()
}

fn apply_benchmarks(c: &mut Criterion) {
    let batch = entries(1000);

    c.bench_function("apply_1000_entries", |b| {
        b.iter_batched(
            open,
            |state| {
                for entry in &batch {
                    state.on_committed_entry(entry).unwrap();
                }
                state
            },
            BatchSize::SmallInput,
        )
    });
}

fn read_benchmarks(c: &mut Criterion) {
    let state = open();
    for entry in entries(1000) {
        state.on_committed_entry(&entry).unwrap();
    }
    let keys: Vec<String> = (0..16).map(|i| format!("key{:06}", i * 37)).collect();
    let options = ReadOptions::default();

    c.bench_function("multi_get_16_keys", |b| {
        b.iter(|| black_box(state.multi_get(&keys, &options).unwrap()))
    });

    c.bench_function("snapshot_produce_encode", |b| {
        b.iter(|| black_box(state.get_snapshot(None).unwrap().encode().unwrap()))
    });
}

criterion_group!(benches, apply_benchmarks, read_benchmarks);
criterion_main!(benches);
