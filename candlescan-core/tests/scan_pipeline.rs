//! Integration tests across planning, storage, detection, and scoring.

use candlescan_core::data::{plan_symbol, FetchPlan, MemoryStore, PlannerOptions, PriceStore};
use candlescan_core::domain::{Bar, PriceSeries};
use candlescan_core::patterns::{PatternEngine, PatternError, RECOGNIZERS};
use candlescan_core::scoring::{BiasTable, ScoreCategory, Scorer, ScoringConfig};
use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn bar(symbol: &str, date: NaiveDate, (open, high, low, close): (f64, f64, f64, f64)) -> Bar {
    Bar {
        symbol: symbol.into(),
        date,
        open,
        high,
        low,
        close,
        volume: 10_000,
        timezone: "America/New_York".into(),
    }
}

/// Weekday background bars from `start` through `end`.
fn background(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| date.weekday().number_from_monday() <= 5)
        .map(|date| bar(symbol, date, (100.0, 101.5, 99.5, 101.0)))
        .collect()
}

fn scorer() -> Scorer {
    Scorer::new(Arc::new(BiasTable::builtin().unwrap()), ScoringConfig::default())
}

#[test]
fn delta_fetch_extends_cache_and_moves_evaluated_bar() {
    let store = MemoryStore::new();
    let today = d(2024, 6, 14);
    let yesterday = d(2024, 6, 13);
    store
        .upsert("AAPL", &background("AAPL", d(2023, 1, 2), yesterday))
        .unwrap();

    let plan = plan_symbol(&store, "AAPL", today, &PlannerOptions::default()).unwrap();
    assert_eq!(plan, FetchPlan::Delta { start: today, end: today });

    // The "fetched" session is a hammer.
    store
        .upsert("AAPL", &[bar("AAPL", today, (99.6, 99.85, 99.0, 99.8))])
        .unwrap();
    assert_eq!(store.get_latest_date("AAPL").unwrap(), Some(today));

    let series = store.get_all("AAPL").unwrap();
    let hits = PatternEngine::all().evaluate(&series).unwrap();
    assert!(hits.iter().any(|h| h.pattern.as_str() == "CDLHAMMER"));

    let breakdown = scorer().score(&hits).unwrap();
    assert!((-5..=5).contains(&breakdown.score));

    // Planning again is a no-op.
    let again = plan_symbol(&store, "AAPL", today, &PlannerOptions::default()).unwrap();
    assert!(again.is_noop());
}

#[test]
fn builtin_table_covers_every_recognizer() {
    let table = BiasTable::builtin().unwrap();
    assert_eq!(RECOGNIZERS.len(), 61);
    for rec in RECOGNIZERS.iter() {
        assert!(table.contains(rec.id.as_str()), "missing bias row for {}", rec.id);
    }
}

#[test]
fn every_recognizer_is_quiet_on_flat_history() {
    let bars = background("SPY", d(2024, 1, 1), d(2024, 3, 29));
    let series = PriceSeries::from_bars("SPY", bars);
    let hits = PatternEngine::all().evaluate(&series).unwrap();
    assert!(hits.is_empty(), "unexpected hits: {hits:?}");
}

#[test]
fn short_history_is_an_error_not_empty() {
    let bars = background("SPY", d(2024, 1, 1), d(2024, 1, 5));
    let series = PriceSeries::from_bars("SPY", bars);
    let err = PatternEngine::all().evaluate(&series).unwrap_err();
    assert!(matches!(err, PatternError::InsufficientHistory { got: 5, .. }));
}

#[test]
fn engulfing_after_decline_scores_bullish() {
    let mut bars = background("KO", d(2024, 1, 1), d(2024, 2, 29));
    let next = bars.last().unwrap().date + Duration::days(1);
    bars.push(bar("KO", next, (102.0, 102.5, 99.5, 100.0)));
    bars.push(bar("KO", next + Duration::days(1), (99.5, 103.0, 99.4, 102.5)));
    let series = PriceSeries::from_bars("KO", bars);

    let enabled = vec!["CDLENGULFING".to_string()];
    let engine = PatternEngine::new(Some(&enabled)).unwrap();
    let hits = engine.evaluate(&series).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].value, 100);

    let scored = scorer().score(&hits).unwrap();
    assert!(scored.score > 0);
    assert_ne!(ScoreCategory::from_score(scored.score), ScoreCategory::Neutral);
}

#[test]
fn history_timeline_includes_final_bar() {
    let mut bars = background("AAPL", d(2024, 1, 1), d(2024, 3, 28));
    bars.push(bar("AAPL", d(2024, 3, 29), (99.6, 99.85, 99.0, 99.8)));
    let series = PriceSeries::from_bars("AAPL", bars);

    let days = PatternEngine::all().evaluate_history(&series, 10).unwrap();
    assert_eq!(days.last().map(|day| day.date), Some(d(2024, 3, 29)));
    assert!(days.iter().all(|day| !day.hits.is_empty()));
}
