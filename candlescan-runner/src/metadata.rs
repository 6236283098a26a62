//! Symbol metadata refresh.
//!
//! Cached metadata younger than `refresh_after_days` is reused. Missing or
//! stale entries are requested from the metadata source on the fetch pool.
//! Source failures are tolerated: the symbol keeps whatever is known and its
//! market is inferred from the ticker.

use crate::config::MetadataConfig;
use candlescan_core::data::{MetadataSource, PriceStore, StoreError};
use candlescan_core::domain::{infer_market, SymbolMetadata, SymbolRecord};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Resolve metadata for every record, in record order.
pub fn refresh_metadata(
    store: &dyn PriceStore,
    source: Option<&dyn MetadataSource>,
    records: &[SymbolRecord],
    now: NaiveDateTime,
    config: &MetadataConfig,
    pool: &rayon::ThreadPool,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<SymbolMetadata>, StoreError> {
    pool.install(|| {
        records
            .par_iter()
            .map(|record| resolve_one(store, source, record, now, config, cancel))
            .collect()
    })
}

fn resolve_one(
    store: &dyn PriceStore,
    source: Option<&dyn MetadataSource>,
    record: &SymbolRecord,
    now: NaiveDateTime,
    config: &MetadataConfig,
    cancel: Option<&AtomicBool>,
) -> Result<SymbolMetadata, StoreError> {
    let symbol = record.symbol.as_str();
    let cached = store.get_metadata(symbol)?;

    let fresh = cached
        .as_ref()
        .is_some_and(|m| !m.is_stale(now, config.refresh_after_days));
    let source = source.filter(|_| config.enabled && !fresh);
    let cancelled = cancel.is_some_and(|f| f.load(Ordering::Relaxed));

    let resolved = match (source, cancelled) {
        (Some(source), false) => match source.fetch_metadata(symbol) {
            Ok(fields) => {
                let meta = SymbolMetadata {
                    symbol: symbol.to_string(),
                    name: fields.name,
                    sector: fields.sector,
                    market: record.market.unwrap_or_else(|| infer_market(symbol)),
                    last_updated: now,
                };
                let meta = fill_gaps(meta, cached.as_ref(), record);
                store.upsert_metadata(&meta)?;
                debug!(symbol, "metadata refreshed");
                meta
            }
            Err(e) => {
                warn!(symbol, error = %e, "metadata lookup failed, continuing without it");
                let base = cached
                    .clone()
                    .unwrap_or_else(|| SymbolMetadata::inferred(symbol, now));
                fill_gaps(base, None, record)
            }
        },
        _ => {
            let base = cached
                .clone()
                .unwrap_or_else(|| SymbolMetadata::inferred(symbol, now));
            fill_gaps(base, None, record)
        }
    };
    Ok(resolved)
}

/// Fill blank fields from the previous cache entry, then from the watchlist.
fn fill_gaps(mut meta: SymbolMetadata, previous: Option<&SymbolMetadata>, record: &SymbolRecord) -> SymbolMetadata {
    if let Some(prev) = previous {
        meta.name = meta.name.or_else(|| prev.name.clone());
        meta.sector = meta.sector.or_else(|| prev.sector.clone());
    }
    if meta.name.is_none() && !record.name.is_empty() {
        meta.name = Some(record.name.clone());
    }
    if meta.sector.is_none() && !record.sector.is_empty() {
        meta.sector = Some(record.sector.clone());
    }
    if let Some(market) = record.market {
        meta.market = market;
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlescan_core::data::{DataError, MemoryStore, MetadataFields};
    use candlescan_core::domain::Market;
    use chrono::{Duration, NaiveDate};
    use std::sync::atomic::AtomicU32;

    struct FakeMeta {
        calls: AtomicU32,
        fail: bool,
    }

    impl FakeMeta {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    impl MetadataSource for FakeMeta {
        fn fetch_metadata(&self, symbol: &str) -> Result<MetadataFields, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DataError::Timeout(symbol.to_string()));
            }
            Ok(MetadataFields {
                name: Some(format!("{symbol} Inc.")),
                sector: None,
                timezone: Some("America/New_York".into()),
            })
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    fn record(symbol: &str, sector: &str) -> SymbolRecord {
        SymbolRecord {
            sector: sector.into(),
            ..SymbolRecord::new(symbol)
        }
    }

    #[test]
    fn fresh_cache_is_reused() {
        let store = MemoryStore::new();
        let mut cached = SymbolMetadata::inferred("AAPL", now() - Duration::days(3));
        cached.name = Some("Apple".into());
        store.upsert_metadata(&cached).unwrap();
        let source = FakeMeta::new(false);

        let out = refresh_metadata(
            &store,
            Some(&source),
            &[record("AAPL", "")],
            now(),
            &MetadataConfig::default(),
            &pool(),
            None,
        )
        .unwrap();

        assert_eq!(out[0].name.as_deref(), Some("Apple"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stale_entry_is_refreshed_and_persisted() {
        let store = MemoryStore::new();
        store
            .upsert_metadata(&SymbolMetadata::inferred("AAPL", now() - Duration::days(45)))
            .unwrap();
        let source = FakeMeta::new(false);

        let out = refresh_metadata(
            &store,
            Some(&source),
            &[record("AAPL", "Technology")],
            now(),
            &MetadataConfig::default(),
            &pool(),
            None,
        )
        .unwrap();

        assert_eq!(out[0].name.as_deref(), Some("AAPL Inc."));
        assert_eq!(out[0].sector.as_deref(), Some("Technology"));
        assert_eq!(out[0].last_updated, now());
        assert_eq!(store.get_metadata("AAPL").unwrap().unwrap().last_updated, now());
    }

    #[test]
    fn source_failure_is_tolerated() {
        let store = MemoryStore::new();
        let source = FakeMeta::new(true);
        let out = refresh_metadata(
            &store,
            Some(&source),
            &[record("7203", ""), record("SHOP.TO", "")],
            now(),
            &MetadataConfig::default(),
            &pool(),
            None,
        )
        .unwrap();

        assert_eq!(out[0].symbol, "7203.T");
        assert_eq!(out[0].market, Market::Jp);
        assert_eq!(out[1].market, Market::Ca);
        assert!(out[0].name.is_none());
        assert!(store.get_metadata("7203.T").unwrap().is_none());
    }

    #[test]
    fn disabled_refresh_never_calls_source() {
        let store = MemoryStore::new();
        let source = FakeMeta::new(false);
        let config = MetadataConfig {
            enabled: false,
            ..MetadataConfig::default()
        };
        let out = refresh_metadata(&store, Some(&source), &[record("MSFT", "")], now(), &config, &pool(), None)
            .unwrap();
        assert_eq!(out[0].market, Market::Us);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
