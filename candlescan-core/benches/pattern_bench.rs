//! Criterion benchmarks for scan hot paths.
//!
//! Benchmarks:
//! 1. Full recognizer set on the final bar (per-symbol scan cost)
//! 2. History timeline over the last N bars
//! 3. Scoring a hit list against the builtin bias table

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use candlescan_core::domain::{Bar, PriceSeries};
use candlescan_core::patterns::PatternEngine;
use candlescan_core::scoring::{BiasTable, Scorer, ScoringConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> PriceSeries {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let bars = (0..n).map(|i| {
        let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
        let open = close - (i as f64 * 0.7).cos() * 1.2;
        Bar {
            symbol: "BENCH".into(),
            date: base_date + chrono::Duration::days(i as i64),
            open,
            high: open.max(close) + 0.8,
            low: open.min(close) - 0.8,
            close,
            volume: 1_000_000 + (i as u64 % 500_000),
            timezone: "America/New_York".into(),
        }
    });
    PriceSeries::from_bars("BENCH", bars)
}

// ── 1. Final-bar evaluation ─────────────────────────────────────────

fn bench_evaluate(c: &mut Criterion) {
    let engine = PatternEngine::all();
    let mut group = c.benchmark_group("evaluate_final_bar");
    for n in [60, 400] {
        let series = make_series(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, series| {
            b.iter(|| engine.evaluate(black_box(series)).unwrap())
        });
    }
    group.finish();
}

// ── 2. Timeline ─────────────────────────────────────────────────────

fn bench_history(c: &mut Criterion) {
    let engine = PatternEngine::all();
    let series = make_series(400);
    let mut group = c.benchmark_group("evaluate_history");
    for days in [5, 60] {
        group.bench_with_input(BenchmarkId::from_parameter(days), &days, |b, &days| {
            b.iter(|| engine.evaluate_history(black_box(&series), days).unwrap())
        });
    }
    group.finish();
}

// ── 3. Scoring ──────────────────────────────────────────────────────

fn bench_score(c: &mut Criterion) {
    let engine = PatternEngine::all();
    let scorer = Scorer::new(Arc::new(BiasTable::builtin().unwrap()), ScoringConfig::default());
    let series = make_series(400);
    let hits: Vec<_> = engine
        .evaluate_history(&series, 400)
        .unwrap()
        .into_iter()
        .flat_map(|day| day.hits)
        .take(10)
        .collect();

    c.bench_function("score_10_hits", |b| b.iter(|| scorer.score(black_box(&hits)).unwrap()));
}

criterion_group!(benches, bench_evaluate, bench_history, bench_score);
criterion_main!(benches);
