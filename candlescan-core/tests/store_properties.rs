//! Property tests for the Price Store contract.
//!
//! Both store implementations must agree on:
//! 1. Last write wins per (symbol, date)
//! 2. Reads are ascending, deduplicated, and clipped to the window
//! 3. The latest date is the maximum ever written

use candlescan_core::data::{MemoryStore, ParquetStore, PriceStore};
use candlescan_core::domain::Bar;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("candlescan_store_prop_{}_{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn bar(day: i64, close: f64) -> Bar {
    Bar {
        symbol: "AAPL".into(),
        date: base() + Duration::days(day),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 100,
        timezone: "America/New_York".into(),
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// A sequence of upsert batches over a small date range so dates collide.
fn arb_batches() -> impl Strategy<Value = Vec<Vec<(i64, f64)>>> {
    prop::collection::vec(
        prop::collection::vec((0..30_i64, (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)), 1..12),
        1..6,
    )
}

fn expected(batches: &[Vec<(i64, f64)>]) -> BTreeMap<i64, f64> {
    let mut model = BTreeMap::new();
    for batch in batches {
        for &(day, close) in batch {
            model.insert(day, close);
        }
    }
    model
}

fn check_store(store: &dyn PriceStore, batches: &[Vec<(i64, f64)>]) -> Result<(), TestCaseError> {
    for batch in batches {
        let bars: Vec<Bar> = batch.iter().map(|&(day, close)| bar(day, close)).collect();
        store.upsert("AAPL", &bars).map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
    let model = expected(batches);
    let series = store.get_all("AAPL").map_err(|e| TestCaseError::fail(e.to_string()))?;

    prop_assert_eq!(series.len(), model.len());
    for (stored, (&day, &close)) in series.bars().iter().zip(model.iter()) {
        prop_assert_eq!(stored.date, base() + Duration::days(day));
        prop_assert_eq!(stored.close, close);
    }
    let latest = store.get_latest_date("AAPL").map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(latest, model.keys().last().map(|&d| base() + Duration::days(d)));
    Ok(())
}

proptest! {
    /// Memory store: overlapping upserts keep the most recent value per date.
    #[test]
    fn memory_store_last_write_wins(batches in arb_batches()) {
        let store = MemoryStore::new();
        check_store(&store, &batches)?;
    }

    /// Range reads never leave the requested window.
    #[test]
    fn range_reads_are_clipped(batches in arb_batches(), lo in 0..30_i64, width in 0..30_i64) {
        let store = MemoryStore::new();
        for batch in &batches {
            let bars: Vec<Bar> = batch.iter().map(|&(day, close)| bar(day, close)).collect();
            store.upsert("AAPL", &bars).unwrap();
        }
        let start = base() + Duration::days(lo);
        let end = start + Duration::days(width);
        let series = store.get_range("AAPL", start, end).unwrap();
        prop_assert!(series.bars().iter().all(|b| b.date >= start && b.date <= end));
        prop_assert!(series.bars().windows(2).all(|w| w[0].date < w[1].date));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Parquet store honours the same contract, including across reopen.
    #[test]
    fn parquet_store_last_write_wins(batches in arb_batches()) {
        let dir = temp_dir();
        {
            let store = ParquetStore::new(&dir);
            check_store(&store, &batches)?;
        }
        let reopened = ParquetStore::new(&dir);
        let model = expected(&batches);
        prop_assert_eq!(reopened.get_all("AAPL").unwrap().len(), model.len());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
