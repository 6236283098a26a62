//! Price Store: durable per-symbol cache of daily bars and metadata.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/`
//! - `bars.parquet`: every cached bar for the symbol, ascending by date
//! - `manifest.json`: date range, bar count, coverage start, BLAKE3 data hash
//! - `metadata.json`: [`SymbolMetadata`]
//!
//! Upserts merge last-write-wins by date, write the merged set to a `.tmp`
//! file, and rename it into place, so readers see either the old or the new
//! batch and never a partial one. Writers for one symbol are serialized by a
//! per-symbol lock; writers for different symbols never contend.

use crate::domain::{Bar, PriceSeries, SymbolMetadata};
use crate::error::ErrorCode;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// Storage errors. Never retried here; they propagate to the caller.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cache I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("corrupt cache entry for {symbol}: {reason}")]
    Corrupt { symbol: String, reason: String },

    #[error("bar for {found} passed to upsert for {expected}")]
    SymbolMismatch { expected: String, found: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::StoreIo
    }

    fn io(path: &Path, e: impl std::fmt::Display) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

/// Per-symbol summary kept next to the bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    /// Earliest start date ever requested from the source. History before this
    /// date is known not to exist upstream if `start_date` is later.
    pub coverage_start: Option<NaiveDate>,
    pub data_hash: String,
    pub updated_at: NaiveDateTime,
}

/// What an upsert changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub total: usize,
}

/// Contract shared by the durable Parquet store and the in-memory store.
pub trait PriceStore: Send + Sync {
    /// Merge bars for one symbol, overwriting rows with the same date.
    /// Atomic per call.
    fn upsert(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertSummary, StoreError>;

    /// Bars with `start <= date <= end`, ascending. May be shorter than the window.
    fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, StoreError>;

    /// Most recent stored date, or `None` when the symbol has no data.
    fn get_latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError>;

    /// Summary of what is cached for a symbol.
    fn manifest(&self, symbol: &str) -> Result<Option<StoreManifest>, StoreError>;

    /// Remember that history was requested back to `requested_start`.
    /// No-op for symbols without bars.
    fn record_coverage(&self, symbol: &str, requested_start: NaiveDate) -> Result<(), StoreError>;

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>, StoreError>;

    fn upsert_metadata(&self, meta: &SymbolMetadata) -> Result<(), StoreError>;

    /// Symbols with cached bars, sorted.
    fn symbols(&self) -> Result<Vec<String>, StoreError>;

    /// Entire cached series for a symbol.
    fn get_all(&self, symbol: &str) -> Result<PriceSeries, StoreError> {
        self.get_range(symbol, NaiveDate::MIN, NaiveDate::MAX)
    }
}

fn check_symbols(symbol: &str, bars: &[Bar]) -> Result<(), StoreError> {
    match bars.iter().find(|b| b.symbol != symbol) {
        Some(b) => Err(StoreError::SymbolMismatch {
            expected: symbol.to_string(),
            found: b.symbol.clone(),
        }),
        None => Ok(()),
    }
}

/// Merge `incoming` into `existing`, last write wins.
fn merge_bars(existing: &mut BTreeMap<NaiveDate, Bar>, incoming: &[Bar]) -> UpsertSummary {
    let mut summary = UpsertSummary::default();
    for bar in incoming {
        match existing.insert(bar.date, bar.clone()) {
            Some(_) => summary.replaced += 1,
            None => summary.inserted += 1,
        }
    }
    summary.total = existing.len();
    summary
}

fn data_hash(bars: &[Bar]) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(bars).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn build_manifest(
    symbol: &str,
    bars: &[Bar],
    coverage_start: Option<NaiveDate>,
) -> Result<Option<StoreManifest>, StoreError> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Ok(None);
    };
    Ok(Some(StoreManifest {
        symbol: symbol.to_string(),
        start_date: first.date,
        end_date: last.date,
        bar_count: bars.len(),
        coverage_start,
        data_hash: data_hash(bars)?,
        updated_at: chrono::Local::now().naive_local(),
    }))
}

/// Lazily created lock per key. The registry lock is held only for the lookup.
#[derive(Debug)]
struct LockRegistry<T> {
    slots: Mutex<HashMap<String, Arc<Mutex<T>>>>,
}

impl<T: Default> LockRegistry<T> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Arc<Mutex<T>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.to_string()).or_default().clone()
    }

    fn existing(&self, key: &str) -> Option<Arc<Mutex<T>>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).cloned()
    }

    fn entries(&self) -> Vec<(String, Arc<Mutex<T>>)> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Parquet store ───────────────────────────────────────────────────

/// Durable store backed by one Parquet file per symbol.
pub struct ParquetStore {
    cache_dir: PathBuf,
    locks: LockRegistry<()>,
}

impl ParquetStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            locks: LockRegistry::new(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory for a specific symbol: `{cache_dir}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("bars.parquet")
    }

    fn manifest_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("manifest.json")
    }

    fn metadata_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("metadata.json")
    }

    /// Load every cached bar for a symbol (empty when nothing is cached).
    fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, StoreError> {
        let path = self.bars_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let df = read_parquet(&path)?;
        dataframe_to_bars(symbol, &df)
    }

    fn read_manifest(&self, symbol: &str) -> Result<Option<StoreManifest>, StoreError> {
        read_json(&self.manifest_path(symbol))
    }
}

impl PriceStore for ParquetStore {
    fn upsert(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertSummary, StoreError> {
        check_symbols(symbol, bars)?;
        if bars.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let slot = self.locks.slot(symbol);
        let _guard = lock(&slot);

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir).map_err(|e| StoreError::io(&sym_dir, e))?;

        let mut merged: BTreeMap<NaiveDate, Bar> =
            self.load_bars(symbol)?.into_iter().map(|b| (b.date, b)).collect();
        let summary = merge_bars(&mut merged, bars);
        let merged: Vec<Bar> = merged.into_values().collect();

        let coverage_start = self.read_manifest(symbol)?.and_then(|m| m.coverage_start);
        let manifest = build_manifest(symbol, &merged, coverage_start)?;

        let df = bars_to_dataframe(&merged)?;
        let path = self.bars_path(symbol);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::io(&path, format!("atomic rename failed: {e}"))
        })?;

        // The bars are committed. A manifest left stale here is rebuilt by the
        // next `record_coverage`, and readers take dates from the bars file.
        if let Some(manifest) = manifest {
            if let Err(e) = write_json(&self.manifest_path(symbol), &manifest) {
                warn!(symbol, error = %e, "manifest write failed after commit");
            }
        }

        debug!(
            symbol,
            inserted = summary.inserted,
            replaced = summary.replaced,
            total = summary.total,
            "upserted bars"
        );
        Ok(summary)
    }

    fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, StoreError> {
        let bars = self.load_bars(symbol)?;
        Ok(PriceSeries::from_bars(
            symbol,
            bars.into_iter().filter(|b| b.date >= start && b.date <= end),
        ))
    }

    fn get_latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        // The bars file is the source of truth; the manifest is a summary.
        Ok(self.load_bars(symbol)?.iter().map(|b| b.date).max())
    }

    fn manifest(&self, symbol: &str) -> Result<Option<StoreManifest>, StoreError> {
        self.read_manifest(symbol)
    }

    fn record_coverage(&self, symbol: &str, requested_start: NaiveDate) -> Result<(), StoreError> {
        let slot = self.locks.slot(symbol);
        let _guard = lock(&slot);

        let bars = self.load_bars(symbol)?;
        let existing = self.read_manifest(symbol)?;
        let prior = existing.as_ref().and_then(|m| m.coverage_start);
        let coverage = prior.map_or(requested_start, |c| c.min(requested_start));

        let in_sync = existing.as_ref().is_some_and(|m| {
            m.bar_count == bars.len()
                && Some(m.start_date) == bars.first().map(|b| b.date)
                && Some(m.end_date) == bars.last().map(|b| b.date)
        });
        if in_sync && prior == Some(coverage) {
            return Ok(());
        }
        match build_manifest(symbol, &bars, Some(coverage))? {
            Some(manifest) => write_json(&self.manifest_path(symbol), &manifest),
            None => Ok(()),
        }
    }

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>, StoreError> {
        read_json(&self.metadata_path(symbol))
    }

    fn upsert_metadata(&self, meta: &SymbolMetadata) -> Result<(), StoreError> {
        let slot = self.locks.slot(&meta.symbol);
        let _guard = lock(&slot);

        let sym_dir = self.symbol_dir(&meta.symbol);
        fs::create_dir_all(&sym_dir).map_err(|e| StoreError::io(&sym_dir, e))?;
        write_json(&self.metadata_path(&meta.symbol), meta)
    }

    fn symbols(&self) -> Result<Vec<String>, StoreError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir).map_err(|e| StoreError::io(&self.cache_dir, e))?;
        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.cache_dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(symbol) = name.strip_prefix("symbol=") {
                if entry.path().join("bars.parquet").exists() {
                    symbols.push(symbol.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

// ── JSON sidecar helpers ────────────────────────────────────────────

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|e| StoreError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(path, format!("atomic rename failed: {e}"))
    })
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert bars to a Polars DataFrame.
fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, StoreError> {
    let epoch = epoch();
    let dates: Vec<i32> = bars.iter().map(|b| (b.date - epoch).num_days() as i32).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let timezones: Vec<String> = bars.iter().map(|b| b.timezone.clone()).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("timezone".into(), timezones),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|e| StoreError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StoreError::Parquet(format!("write {}: {e}", path.display())))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read {}: {e}", path.display())))
}

/// Convert a DataFrame back to bars, validating the schema.
fn dataframe_to_bars(symbol: &str, df: &DataFrame) -> Result<Vec<Bar>, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        symbol: symbol.to_string(),
        reason,
    };
    let column = |name: &str| {
        df.column(name)
            .map_err(|_| corrupt(format!("missing column '{name}'")))
    };

    let date_ca = column("date")?
        .date()
        .map_err(|e| corrupt(format!("date column type: {e}")))?;
    let open_ca = column("open")?
        .f64()
        .map_err(|e| corrupt(format!("open column type: {e}")))?;
    let high_ca = column("high")?
        .f64()
        .map_err(|e| corrupt(format!("high column type: {e}")))?;
    let low_ca = column("low")?
        .f64()
        .map_err(|e| corrupt(format!("low column type: {e}")))?;
    let close_ca = column("close")?
        .f64()
        .map_err(|e| corrupt(format!("close column type: {e}")))?;
    let vol_ca = column("volume")?
        .u64()
        .map_err(|e| corrupt(format!("volume column type: {e}")))?;
    let tz_ca = column("timezone")?
        .str()
        .map_err(|e| corrupt(format!("timezone column type: {e}")))?;

    let epoch = epoch();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| corrupt(format!("null date at row {i}")))?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            date: epoch + chrono::Duration::days(date_days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            timezone: tz_ca.get(i).unwrap_or_default().to_string(),
        });
    }

    Ok(bars)
}

// ── In-memory store ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemorySlot {
    bars: BTreeMap<NaiveDate, Bar>,
    coverage_start: Option<NaiveDate>,
    metadata: Option<SymbolMetadata>,
}

/// Non-durable store with the same contract, for tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore {
    slots: LockRegistry<MemorySlot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            slots: LockRegistry::new(),
        }
    }
}

impl PriceStore for MemoryStore {
    fn upsert(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertSummary, StoreError> {
        check_symbols(symbol, bars)?;
        if bars.is_empty() {
            return Ok(UpsertSummary::default());
        }
        let slot = self.slots.slot(symbol);
        let mut slot = lock(&slot);
        Ok(merge_bars(&mut slot.bars, bars))
    }

    fn get_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, StoreError> {
        let Some(slot) = self.slots.existing(symbol) else {
            return Ok(PriceSeries::from_bars(symbol, Vec::new()));
        };
        let slot = lock(&slot);
        Ok(PriceSeries::from_bars(
            symbol,
            slot.bars.range(start..=end).map(|(_, b)| b.clone()),
        ))
    }

    fn get_latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        let Some(slot) = self.slots.existing(symbol) else {
            return Ok(None);
        };
        let latest = lock(&slot).bars.keys().next_back().copied();
        Ok(latest)
    }

    fn manifest(&self, symbol: &str) -> Result<Option<StoreManifest>, StoreError> {
        let Some(slot) = self.slots.existing(symbol) else {
            return Ok(None);
        };
        let slot = lock(&slot);
        let bars: Vec<Bar> = slot.bars.values().cloned().collect();
        build_manifest(symbol, &bars, slot.coverage_start)
    }

    fn record_coverage(&self, symbol: &str, requested_start: NaiveDate) -> Result<(), StoreError> {
        if let Some(slot) = self.slots.existing(symbol) {
            let mut slot = lock(&slot);
            if !slot.bars.is_empty() {
                slot.coverage_start = Some(
                    slot.coverage_start
                        .map_or(requested_start, |c| c.min(requested_start)),
                );
            }
        }
        Ok(())
    }

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>, StoreError> {
        let Some(slot) = self.slots.existing(symbol) else {
            return Ok(None);
        };
        let metadata = lock(&slot).metadata.clone();
        Ok(metadata)
    }

    fn upsert_metadata(&self, meta: &SymbolMetadata) -> Result<(), StoreError> {
        let slot = self.slots.slot(&meta.symbol);
        lock(&slot).metadata = Some(meta.clone());
        Ok(())
    }

    fn symbols(&self) -> Result<Vec<String>, StoreError> {
        let mut symbols = Vec::new();
        for (symbol, slot) in self.slots.entries() {
            let has_bars = !lock(&slot).bars.is_empty();
            if has_bars {
                symbols.push(symbol);
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("candlescan_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 1000,
            timezone: "America/New_York".into(),
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn parquet_upsert_and_read_roundtrip() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        store
            .upsert("SPY", &[bar("SPY", 2, 101.0), bar("SPY", 3, 102.0)])
            .unwrap();
        let series = store.get_all("SPY").unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, d(2));
        assert_eq!(series.bars()[1].close, 102.0);
        assert_eq!(series.bars()[1].timezone, "America/New_York");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_overwrites_same_date() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        store.upsert("SPY", &[bar("SPY", 2, 101.0), bar("SPY", 3, 102.0)]).unwrap();
        let summary = store.upsert("SPY", &[bar("SPY", 3, 99.0), bar("SPY", 4, 103.0)]).unwrap();

        assert_eq!(summary, UpsertSummary { inserted: 1, replaced: 1, total: 3 });
        let series = store.get_all("SPY").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[1].close, 99.0);
        assert_eq!(store.get_latest_date("SPY").unwrap(), Some(d(4)));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_range_is_clipped() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        let bars: Vec<Bar> = (2..=10).map(|day| bar("SPY", day, 100.0 + day as f64)).collect();
        store.upsert("SPY", &bars).unwrap();

        let series = store.get_range("SPY", d(4), d(6)).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), Some(d(4)));
        assert_eq!(series.last_date(), Some(d(6)));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_missing_symbol_is_empty_not_error() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        assert!(store.get_all("NONE").unwrap().is_empty());
        assert_eq!(store.get_latest_date("NONE").unwrap(), None);
        assert_eq!(store.manifest("NONE").unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_manifest_tracks_coverage() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        store.upsert("SPY", &[bar("SPY", 5, 101.0)]).unwrap();
        store.record_coverage("SPY", d(1)).unwrap();
        store.record_coverage("SPY", d(3)).unwrap();
        store.upsert("SPY", &[bar("SPY", 8, 102.0)]).unwrap();

        let manifest = store.manifest("SPY").unwrap().unwrap();
        assert_eq!(manifest.start_date, d(5));
        assert_eq!(manifest.end_date, d(8));
        assert_eq!(manifest.bar_count, 2);
        assert_eq!(manifest.coverage_start, Some(d(1)));
        assert_eq!(manifest.data_hash.len(), 64);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_metadata_and_symbols() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);

        store.upsert("SPY", &[bar("SPY", 2, 101.0)]).unwrap();
        store.upsert("AAPL", &[bar("AAPL", 2, 101.0)]).unwrap();
        let meta = SymbolMetadata {
            name: Some("Apple Inc.".into()),
            ..SymbolMetadata::inferred("AAPL", d(2).and_hms_opt(0, 0, 0).unwrap())
        };
        store.upsert_metadata(&meta).unwrap();

        assert_eq!(store.get_metadata("AAPL").unwrap(), Some(meta));
        assert_eq!(store.get_metadata("SPY").unwrap(), None);
        assert_eq!(store.symbols().unwrap(), vec!["AAPL".to_string(), "SPY".to_string()]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parquet_survives_reopen() {
        let dir = temp_cache_dir();
        ParquetStore::new(&dir).upsert("SPY", &[bar("SPY", 2, 101.0)]).unwrap();
        let reopened = ParquetStore::new(&dir);
        assert_eq!(reopened.get_latest_date("SPY").unwrap(), Some(d(2)));
        assert!(!dir.join("symbol=SPY/bars.parquet.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn upsert_rejects_foreign_bars() {
        let store = MemoryStore::new();
        let err = store.upsert("SPY", &[bar("QQQ", 2, 1.0)]).unwrap_err();
        assert!(matches!(err, StoreError::SymbolMismatch { .. }));
        assert!(store.get_all("SPY").unwrap().is_empty());
    }

    #[test]
    fn memory_store_matches_contract() {
        let store = MemoryStore::new();
        store.upsert("SPY", &[bar("SPY", 2, 101.0), bar("SPY", 3, 102.0)]).unwrap();
        store.upsert("SPY", &[bar("SPY", 3, 50.0)]).unwrap();
        store.record_coverage("SPY", d(1)).unwrap();
        store.record_coverage("NONE", d(1)).unwrap();

        let series = store.get_range("SPY", d(1), d(31)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[1].close, 50.0);
        assert_eq!(store.get_latest_date("SPY").unwrap(), Some(d(3)));
        assert_eq!(store.manifest("SPY").unwrap().unwrap().coverage_start, Some(d(1)));
        assert_eq!(store.manifest("NONE").unwrap(), None);
        assert_eq!(store.symbols().unwrap(), vec!["SPY".to_string()]);
    }

    #[test]
    fn concurrent_upserts_to_different_symbols() {
        let dir = temp_cache_dir();
        let store = Arc::new(ParquetStore::new(&dir));

        let handles: Vec<_> = ["AAA", "BBB", "CCC", "DDD"]
            .into_iter()
            .map(|sym| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for day in 2..=8 {
                        store.upsert(sym, &[bar(sym, day, day as f64)]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for sym in ["AAA", "BBB", "CCC", "DDD"] {
            let series = store.get_all(sym).unwrap();
            assert_eq!(series.len(), 7);
            assert!(series.bars().iter().all(|b| b.symbol == sym));
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_upserts_to_same_symbol_lose_nothing() {
        let dir = temp_cache_dir();
        let store = Arc::new(ParquetStore::new(&dir));

        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for k in 0..5u32 {
                        let day = 1 + t * 5 + k;
                        store.upsert("SPY", &[bar("SPY", day, day as f64)]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get_all("SPY").unwrap().len(), 20);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn manifest_failure_after_commit_keeps_bars() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);
        // A directory at the manifest's staging path makes its write fail.
        let blocker = store.manifest_path("SPY").with_extension("json.tmp");
        fs::create_dir_all(blocker.join("occupied")).unwrap();

        let summary = store
            .upsert("SPY", &[bar("SPY", 2, 101.0), bar("SPY", 3, 102.0)])
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(store.get_all("SPY").unwrap().len(), 2);
        assert_eq!(store.get_latest_date("SPY").unwrap(), Some(d(3)));

        fs::remove_dir_all(&blocker).unwrap();
        store.record_coverage("SPY", d(1)).unwrap();
        let manifest = store.manifest("SPY").unwrap().unwrap();
        assert_eq!(manifest.start_date, d(2));
        assert_eq!(manifest.end_date, d(3));
        assert_eq!(manifest.bar_count, 2);
        assert_eq!(manifest.coverage_start, Some(d(1)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_manifest_does_not_mislead_planning() {
        let dir = temp_cache_dir();
        let store = ParquetStore::new(&dir);
        let bars: Vec<Bar> = (2..=5).map(|day| bar("SPY", day, 100.0)).collect();
        store.upsert("SPY", &bars).unwrap();

        let mut stale = store.manifest("SPY").unwrap().unwrap();
        stale.start_date = d(4);
        write_json(&store.manifest_path("SPY"), &stale).unwrap();

        let opts = crate::data::PlannerOptions {
            lookback_days: 3,
            ..Default::default()
        };
        let plan = crate::data::plan_symbol(&store, "SPY", d(5), &opts).unwrap();
        assert_eq!(plan, crate::data::FetchPlan::NoOp);
        let _ = fs::remove_dir_all(&dir);
    }
}
