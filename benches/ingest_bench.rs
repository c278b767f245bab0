//! Performance benchmarks for the in-memory part of the scan path.
//!
//! Every scan passes through normalization and the cooldown gate before any
//! I/O happens, so both must stay well below the reader's inter-scan time.
//!
//! # Run Benchmarks
//!
//! ```sh
//! # Run all ingest benchmarks
//! cargo bench --bench ingest_bench
//!
//! # Run a specific group
//! cargo bench --bench ingest_bench -- cooldown
//!
//! # Compare against a saved baseline
//! cargo bench --bench ingest_bench -- --save-baseline main
//! cargo bench --bench ingest_bench -- --baseline main
//! ```

use clockin_core::{CardNumber, CardPolicy, CooldownGate, normalize};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Benchmark normalization across typical reader outputs.
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(1));

    let keep = CardPolicy::default();
    let strip = CardPolicy::stripping("000");

    let test_cases = vec![
        ("typical", "0001234567"),
        ("padded", "  0001234567\r\n"),
        ("long", "12345678901234567890"),
        ("too_short", "12"),
        ("empty", ""),
    ];

    for (name, raw) in test_cases {
        group.bench_with_input(BenchmarkId::new("keep_prefix", name), &raw, |b, &raw| {
            b.iter(|| black_box(normalize(black_box(raw), &keep)));
        });
        group.bench_with_input(BenchmarkId::new("strip_prefix", name), &raw, |b, &raw| {
            b.iter(|| black_box(normalize(black_box(raw), &strip)));
        });
    }

    group.finish();
}

/// Benchmark the cooldown gate with a growing set of tracked cards.
fn bench_cooldown(c: &mut Criterion) {
    let mut group = c.benchmark_group("cooldown");
    group.throughput(Throughput::Elements(1));

    for tracked in [10usize, 1_000, 10_000] {
        let gate = CooldownGate::new();
        let t0 = Instant::now();
        let cards: Vec<CardNumber> = (0..tracked)
            .map(|i| CardNumber::new(&format!("{i:08}")).unwrap())
            .collect();
        for card in &cards {
            gate.admit(card, t0);
        }

        let probe = cards[tracked / 2].clone();
        group.bench_with_input(
            BenchmarkId::new("repeat_rejected", tracked),
            &probe,
            |b, card| {
                b.iter(|| black_box(gate.admit(black_box(card), t0 + Duration::from_secs(1))));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_cooldown);
criterion_main!(benches);
