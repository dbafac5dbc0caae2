//! Benchmarks for ledger operations
//!
//! - Owner membership check across registry sizes
//! - Full proposal lifecycle (submit, confirm to threshold, execute)
//! - Record log encoding
//! - Durable commit through the sqlite store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quorum::dispatch::NoopDispatcher;
use quorum::ledger::{Record, RecordKind};
use quorum::serialization::encode_record;
use quorum::store::{MemoryStore, SqliteStore};
use quorum::{Ledger, LedgerOptions, OwnerRegistry, Principal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

fn owner(id: u32) -> Principal {
    let mut bytes = [0u8; 20];
    bytes[..4].copy_from_slice(&id.to_be_bytes());
    Principal::new(bytes)
}

fn registry(size: u32, threshold: usize) -> OwnerRegistry {
    OwnerRegistry::new((0..size).map(owner).collect(), threshold).unwrap()
}

fn benchmark_owner_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("owner_lookup");
    let mut rng = StdRng::seed_from_u64(7);

    for size in [3u32, 50, 1000] {
        let registry = registry(size, 1);
        // Half the probes miss.
        let probes: Vec<Principal> = (0..256)
            .map(|_| owner(rng.gen_range(0..size * 2)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &probes, |b, probes| {
            b.iter(|| {
                probes
                    .iter()
                    .filter(|p| registry.is_owner(black_box(p)))
                    .count()
            });
        });
    }
    group.finish();
}

fn benchmark_lifecycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("proposal_lifecycle");

    for threshold in [1usize, 3, 7] {
        let ledger = rt.block_on(async {
            Ledger::create(
                registry(7, threshold),
                MemoryStore::new(),
                NoopDispatcher,
                LedgerOptions::default(),
            )
            .await
            .unwrap()
        });

        group.bench_with_input(
            BenchmarkId::new("memory", threshold),
            &threshold,
            |b, &threshold| {
                b.to_async(&rt).iter(|| async {
                    let index = ledger
                        .submit(owner(0), owner(99), 0, vec![0x01, 0x23])
                        .await
                        .unwrap();
                    for id in 0..threshold as u32 {
                        ledger.confirm(owner(id), index).await.unwrap();
                    }
                    ledger.execute(owner(0), index).await.unwrap();
                });
            },
        );
    }
    group.finish();
}

fn benchmark_record_encoding(c: &mut Criterion) {
    let record = Record::new(
        42,
        RecordKind::Submitted {
            owner: owner(1),
            index: 42,
            target: owner(99),
            value: u128::MAX,
            payload: vec![0xab; 256],
        },
    );

    c.bench_function("record_encode_cbor", |b| {
        b.iter(|| encode_record(black_box(&record)).unwrap());
    });
}

fn benchmark_sqlite_commit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ledger = rt.block_on(async {
        let store = SqliteStore::in_memory().await.unwrap();
        Ledger::create(
            registry(3, 2),
            store,
            NoopDispatcher,
            LedgerOptions::default(),
        )
        .await
        .unwrap()
    });

    c.bench_function("sqlite_deposit_commit", |b| {
        b.to_async(&rt)
            .iter(|| async { ledger.deposit(owner(50), 1).await.unwrap() });
    });
}

criterion_group!(
    benches,
    benchmark_owner_lookup,
    benchmark_lifecycle,
    benchmark_record_encoding,
    benchmark_sqlite_commit
);
criterion_main!(benches);
