//! Batch coordinator: per-symbol state machine over fetch and scoring.
//!
//! ```text
//! Pending → Fetching → Fetched ──→ Scoring → Done
//!                    ↘ FetchFailed          ↘ ScoreFailed
//! ```
//!
//! States live in an insertion-ordered map keyed by symbol, so results come
//! back in watchlist order regardless of completion order. A failed symbol
//! never blocks the others; only store and configuration errors abort a batch.

use crate::config::{ConfigError, ScanConfig};
use crate::fetch::{FetchJob, FetchObserver, FetchOrchestrator, FetchOutcome};
use crate::metadata::refresh_metadata;
use crate::retry::RetryPolicy;
use candlescan_core::data::{plan_symbol, FetchPlan, MetadataSource, PriceSource, PriceStore, StoreError};
use candlescan_core::domain::{PriceSeries, SymbolMetadata, SymbolRecord};
use candlescan_core::error::{ErrorCode, SymbolError};
use candlescan_core::patterns::{PatternEngine, PatternError, PatternHit};
use candlescan_core::scoring::{BiasTable, ScoreCategory, ScoredHit, Scorer};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to build fetch pool: {0}")]
    ThreadPool(String),

    #[error("no symbols to scan")]
    EmptyWatchlist,
}

impl BatchError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BatchError::Config(e) => e.error_code(),
            BatchError::Pattern(e) => e.error_code(),
            BatchError::Store(e) => e.error_code(),
            BatchError::ThreadPool(_) => ErrorCode::Config,
            BatchError::EmptyWatchlist => ErrorCode::CsvEmpty,
        }
    }
}

/// Outcome of a successfully scored symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
    pub hits: Vec<ScoredHit>,
    pub raw_total: f64,
    pub score: i32,
    pub category: ScoreCategory,
    pub highlighted: bool,
    pub warnings: Vec<SymbolError>,
    pub timeline: Vec<TimelineDay>,
}

/// Hits on one historical bar with that day's aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub hits: Vec<PatternHit>,
    pub score: i32,
}

/// Where a symbol is in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolState {
    Pending,
    Fetching,
    Fetched { warnings: Vec<SymbolError> },
    FetchFailed { error: SymbolError },
    Scoring,
    Done(Box<ScanOutcome>),
    ScoreFailed { error: SymbolError, warnings: Vec<SymbolError> },
}

impl SymbolState {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolState::Pending => "pending",
            SymbolState::Fetching => "fetching",
            SymbolState::Fetched { .. } => "fetched",
            SymbolState::FetchFailed { .. } => "fetch_failed",
            SymbolState::Scoring => "scoring",
            SymbolState::Done(_) => "done",
            SymbolState::ScoreFailed { .. } => "score_failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SymbolState::FetchFailed { .. } | SymbolState::ScoreFailed { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, SymbolState::Done(_))
    }

    pub fn error(&self) -> Option<&SymbolError> {
        match self {
            SymbolState::FetchFailed { error } | SymbolState::ScoreFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Snapshot of how many symbols are in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub total: usize,
    pub pending: usize,
    pub fetching: usize,
    /// Fetched and awaiting or undergoing scoring.
    pub scoring: usize,
    pub done: usize,
    pub failed: usize,
}

impl BatchCounts {
    pub fn tally<'a>(states: impl IntoIterator<Item = &'a SymbolState>) -> Self {
        let mut counts = BatchCounts::default();
        for state in states {
            counts.total += 1;
            match state {
                SymbolState::Pending => counts.pending += 1,
                SymbolState::Fetching => counts.fetching += 1,
                SymbolState::Fetched { .. } | SymbolState::Scoring => counts.scoring += 1,
                SymbolState::Done(_) => counts.done += 1,
                SymbolState::FetchFailed { .. } | SymbolState::ScoreFailed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

/// Receives state transitions and batch completion. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn on_transition(&self, _symbol: &str, _state: &SymbolState, _counts: &BatchCounts) {}
    fn on_batch_complete(&self, _counts: &BatchCounts) {}
}

/// Discards progress.
impl ProgressSink for () {}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_transition(&self, symbol: &str, state: &SymbolState, counts: &BatchCounts) {
        debug!(
            symbol,
            state = state.label(),
            pending = counts.pending,
            fetching = counts.fetching,
            done = counts.done,
            failed = counts.failed,
            total = counts.total,
            "progress"
        );
    }

    fn on_batch_complete(&self, counts: &BatchCounts) {
        info!(done = counts.done, failed = counts.failed, pending = counts.pending, total = counts.total, "batch complete");
    }
}

/// Final status column of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Done,
    FetchFailed,
    ScoreFailed,
    /// Not processed yet (e.g. the batch was cancelled).
    Pending,
}

/// A symbol's outcome as presented to callers and exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub market: candlescan_core::domain::Market,
    pub status: ResultStatus,
    pub date: Option<NaiveDate>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub score: Option<i32>,
    pub raw_total: Option<f64>,
    pub category: Option<ScoreCategory>,
    pub highlighted: bool,
    pub hits: Vec<ScoredHit>,
    pub warnings: Vec<SymbolError>,
    pub error: Option<SymbolError>,
    pub timeline: Vec<TimelineDay>,
}

impl SymbolResult {
    fn from_state(meta: &SymbolMetadata, state: &SymbolState) -> Self {
        let mut result = SymbolResult {
            symbol: meta.symbol.clone(),
            name: meta.name.clone(),
            sector: meta.sector.clone(),
            market: meta.market,
            status: ResultStatus::Pending,
            date: None,
            close: None,
            volume: None,
            score: None,
            raw_total: None,
            category: None,
            highlighted: false,
            hits: Vec::new(),
            warnings: Vec::new(),
            error: None,
            timeline: Vec::new(),
        };
        match state {
            SymbolState::Done(outcome) => {
                let outcome = outcome.as_ref().clone();
                result.status = ResultStatus::Done;
                result.date = Some(outcome.date);
                result.close = Some(outcome.close);
                result.volume = Some(outcome.volume);
                result.score = Some(outcome.score);
                result.raw_total = Some(outcome.raw_total);
                result.category = Some(outcome.category);
                result.highlighted = outcome.highlighted;
                result.hits = outcome.hits;
                result.warnings = outcome.warnings;
                result.timeline = outcome.timeline;
            }
            SymbolState::FetchFailed { error } => {
                result.status = ResultStatus::FetchFailed;
                result.error = Some(error.clone());
            }
            SymbolState::ScoreFailed { error, warnings } => {
                result.status = ResultStatus::ScoreFailed;
                result.error = Some(error.clone());
                result.warnings = warnings.clone();
            }
            SymbolState::Fetched { warnings } => result.warnings = warnings.clone(),
            SymbolState::Pending | SymbolState::Fetching | SymbolState::Scoring => {}
        }
        result
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ResultStatus::FetchFailed | ResultStatus::ScoreFailed)
    }
}

/// Summary of one `run` / `retry_failed` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Symbols this call picked up.
    pub processed: usize,
    pub counts: BatchCounts,
    pub cancelled: bool,
}

/// Drives a watchlist through fetch, detection, and scoring.
pub struct BatchCoordinator {
    config: ScanConfig,
    store: Arc<dyn PriceStore>,
    price_source: Option<Arc<dyn PriceSource>>,
    metadata_source: Option<Arc<dyn MetadataSource>>,
    progress: Arc<dyn ProgressSink>,
    engine: PatternEngine,
    scorer: Scorer,
    pool: rayon::ThreadPool,
    records: IndexMap<String, SymbolRecord>,
    states: Mutex<IndexMap<String, SymbolState>>,
    metadata: HashMap<String, SymbolMetadata>,
    today: Option<NaiveDate>,
}

impl BatchCoordinator {
    /// Build a coordinator for `records`. Duplicate symbols keep the first entry.
    pub fn new(
        config: ScanConfig,
        store: Arc<dyn PriceStore>,
        bias: Arc<BiasTable>,
        records: Vec<SymbolRecord>,
    ) -> Result<Self, BatchError> {
        config.validate()?;
        let engine = PatternEngine::new(config.analysis.enabled_patterns.as_deref())?;
        let scorer = Scorer::new(bias, config.scoring);

        let mut by_symbol: IndexMap<String, SymbolRecord> = IndexMap::new();
        for record in records.into_iter().filter(|r| !r.symbol.is_empty()) {
            by_symbol.entry(record.symbol.clone()).or_insert(record);
        }
        if by_symbol.is_empty() {
            return Err(BatchError::EmptyWatchlist);
        }
        let states = by_symbol.keys().map(|s| (s.clone(), SymbolState::Pending)).collect();

        let threads = config.fetch.effective_concurrency();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("candlescan-fetch-{i}"))
            .build()
            .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

        Ok(Self {
            config,
            store,
            price_source: None,
            metadata_source: None,
            progress: Arc::new(()),
            engine,
            scorer,
            pool,
            records: by_symbol,
            states: Mutex::new(states),
            metadata: HashMap::new(),
            today: None,
        })
    }

    pub fn with_price_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.price_source = Some(source);
        self
    }

    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata_source = Some(source);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Pin the planning date instead of using the local calendar date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn engine(&self) -> &PatternEngine {
        &self.engine
    }

    pub fn symbols(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn state(&self, symbol: &str) -> Option<SymbolState> {
        self.lock_states().get(symbol).cloned()
    }

    pub fn counts(&self) -> BatchCounts {
        BatchCounts::tally(self.lock_states().values())
    }

    pub fn has_failures(&self) -> bool {
        self.lock_states().values().any(SymbolState::is_failed)
    }

    /// Results for every symbol, in watchlist order.
    pub fn results(&self) -> Vec<SymbolResult> {
        let now = self.now_timestamp();
        let states = self.lock_states();
        states
            .iter()
            .map(|(symbol, state)| {
                let meta = self
                    .metadata
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| self.fallback_metadata(symbol, now));
                SymbolResult::from_state(&meta, state)
            })
            .collect()
    }

    /// Process every `Pending` symbol, and score any left `Fetched` by an
    /// earlier cancelled run.
    pub fn run(&mut self, cancel: Option<&AtomicBool>) -> Result<BatchSummary, BatchError> {
        let (pending, resumable): (Vec<String>, Vec<String>) = {
            let states = self.lock_states();
            let pending = states
                .iter()
                .filter(|(_, s)| matches!(s, SymbolState::Pending))
                .map(|(k, _)| k.clone())
                .collect();
            let resumable = states
                .iter()
                .filter(|(_, s)| matches!(s, SymbolState::Fetched { .. }))
                .map(|(k, _)| k.clone())
                .collect();
            (pending, resumable)
        };
        info!(pending = pending.len(), resumable = resumable.len(), "batch start");
        self.run_symbols(&pending, &resumable, cancel)
    }

    /// Reset exactly the failed symbols to `Pending` and run only those.
    /// `Done` symbols, and symbols a cancelled run left `Pending` or
    /// `Fetched`, are left untouched.
    pub fn retry_failed(&mut self, cancel: Option<&AtomicBool>) -> Result<BatchSummary, BatchError> {
        let reset: Vec<String> = {
            let mut states = self.lock_states();
            states
                .iter_mut()
                .filter(|(_, s)| s.is_failed())
                .map(|(symbol, state)| {
                    *state = SymbolState::Pending;
                    symbol.clone()
                })
                .collect()
        };
        info!(symbols = reset.len(), "retrying failed symbols");
        self.run_symbols(&reset, &[], cancel)
    }

    /// Fetch then score `fetch`; score `resume` from the cache.
    fn run_symbols(
        &mut self,
        fetch: &[String],
        resume: &[String],
        cancel: Option<&AtomicBool>,
    ) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let processed = fetch.len() + resume.len();

        if !fetch.is_empty() {
            self.refresh_metadata(fetch, cancel)?;
            self.fetch_phase(fetch, cancel)?;
        }

        let cancelled = is_cancelled(cancel);
        if !cancelled {
            let targets: Vec<String> = fetch.iter().chain(resume).cloned().collect();
            self.score_phase(&targets)?;
        }

        let counts = self.counts();
        self.progress.on_batch_complete(&counts);
        info!(
            done = counts.done,
            failed = counts.failed,
            pending = counts.pending,
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok(BatchSummary {
            processed,
            counts,
            cancelled,
        })
    }

    fn refresh_metadata(&mut self, symbols: &[String], cancel: Option<&AtomicBool>) -> Result<(), BatchError> {
        let records: Vec<SymbolRecord> = symbols
            .iter()
            .filter_map(|s| self.records.get(s).cloned())
            .collect();
        let source = self
            .metadata_source
            .as_deref()
            .filter(|_| !self.config.fetch.offline);
        let resolved = refresh_metadata(
            self.store.as_ref(),
            source,
            &records,
            self.now_timestamp(),
            &self.config.metadata,
            &self.pool,
            cancel,
        )?;
        for meta in resolved {
            self.metadata.insert(meta.symbol.clone(), meta);
        }
        Ok(())
    }

    fn fetch_phase(&self, symbols: &[String], cancel: Option<&AtomicBool>) -> Result<(), BatchError> {
        let source = self.price_source.clone().filter(|_| !self.config.fetch.offline);
        let Some(source) = source else {
            // Offline: score whatever the cache holds.
            for symbol in symbols {
                if is_cancelled(cancel) {
                    break;
                }
                self.transition(symbol, SymbolState::Fetched { warnings: Vec::new() });
            }
            return Ok(());
        };

        let today = self.today();
        let opts = self.config.fetch.planner_options();
        let mut jobs = Vec::new();
        for symbol in symbols {
            let plan = plan_symbol(self.store.as_ref(), symbol, today, &opts)?;
            if plan == FetchPlan::NoOp {
                debug!(symbol = symbol.as_str(), "cache is fresh");
                self.transition(symbol, SymbolState::Fetched { warnings: Vec::new() });
            } else {
                jobs.push(FetchJob {
                    symbol: symbol.clone(),
                    plan,
                });
            }
        }
        if jobs.is_empty() {
            return Ok(());
        }

        let orchestrator = FetchOrchestrator::new(
            source,
            Arc::clone(&self.store),
            RetryPolicy::from_config(&self.config.fetch.retry),
            self.config.fetch.sanitize.zero_policy,
        );
        let observer = StateObserver { coordinator: self };
        let outcomes = orchestrator.fetch_all(&self.pool, &jobs, cancel, &observer);

        for (job, outcome) in jobs.iter().zip(outcomes) {
            let next = match outcome? {
                FetchOutcome::Fetched(report) => SymbolState::Fetched {
                    warnings: report.warnings,
                },
                FetchOutcome::NotStarted => SymbolState::Pending,
                FetchOutcome::Failed { error, .. } => self.settle_failure(&job.symbol, error)?,
            };
            self.transition(&job.symbol, next);
        }
        Ok(())
    }

    /// Fall back to cached bars when allowed, otherwise fail the symbol.
    fn settle_failure(&self, symbol: &str, error: SymbolError) -> Result<SymbolState, StoreError> {
        let allowed = self.config.fetch.use_stale_on_failure && error.code != ErrorCode::FetchCancelled;
        if allowed && self.store.get_latest_date(symbol)?.is_some() {
            warn!(symbol, code = %error.code, "refresh failed, scoring cached bars");
            let detail = error.to_string();
            return Ok(SymbolState::Fetched {
                warnings: vec![SymbolError::new(ErrorCode::StaleData, symbol).with_detail(detail)],
            });
        }
        Ok(SymbolState::FetchFailed { error })
    }

    /// Score the symbols in `targets` that reached `Fetched`.
    fn score_phase(&self, targets: &[String]) -> Result<(), BatchError> {
        let ready: Vec<(String, Vec<SymbolError>)> = {
            let states = self.lock_states();
            targets
                .iter()
                .filter_map(|symbol| match states.get(symbol) {
                    Some(SymbolState::Fetched { warnings }) => Some((symbol.clone(), warnings.clone())),
                    _ => None,
                })
                .collect()
        };

        let scored: Vec<Result<(String, SymbolState), StoreError>> = ready
            .into_par_iter()
            .map(|(symbol, warnings)| {
                self.transition(&symbol, SymbolState::Scoring);
                let state = self.score_symbol(&symbol, warnings)?;
                Ok((symbol, state))
            })
            .collect();

        for item in scored {
            let (symbol, state) = item?;
            self.transition(&symbol, state);
        }
        Ok(())
    }

    fn score_symbol(&self, symbol: &str, warnings: Vec<SymbolError>) -> Result<SymbolState, StoreError> {
        let series = self.store.get_all(symbol)?;
        let fail = |error: SymbolError, warnings: Vec<SymbolError>| {
            error!(symbol, code = %error.code, detail = ?error.detail, "scoring failed");
            SymbolState::ScoreFailed { error, warnings }
        };

        let hits = match self.engine.evaluate(&series) {
            Ok(hits) => hits,
            Err(e) => {
                let err = SymbolError::new(e.error_code(), symbol).with_detail(e.to_string());
                return Ok(fail(err, warnings));
            }
        };
        let breakdown = match self.scorer.score(&hits) {
            Ok(b) => b,
            Err(e) => {
                let err = SymbolError::new(e.error_code(), symbol).with_detail(e.to_string());
                return Ok(fail(err, warnings));
            }
        };
        let Some(last) = series.last() else {
            let err = SymbolError::new(ErrorCode::InsufficientHistory, symbol);
            return Ok(fail(err, warnings));
        };

        let category = ScoreCategory::from_score(breakdown.score);
        let outcome = ScanOutcome {
            date: last.date,
            close: last.close,
            volume: last.volume,
            highlighted: self.scorer.is_highlighted(breakdown.score),
            category,
            score: breakdown.score,
            raw_total: breakdown.raw_total,
            hits: breakdown.hits,
            warnings,
            timeline: self.timeline(&series),
        };
        debug!(symbol, date = %outcome.date, score = outcome.score, hits = outcome.hits.len(), "scored");
        Ok(SymbolState::Done(Box::new(outcome)))
    }

    fn timeline(&self, series: &PriceSeries) -> Vec<TimelineDay> {
        let days = self.config.analysis.history_lookback;
        if days == 0 {
            return Vec::new();
        }
        let Ok(history) = self.engine.evaluate_history(series, days) else {
            return Vec::new();
        };
        history
            .into_iter()
            .filter_map(|day| match self.scorer.score(&day.hits) {
                Ok(b) => Some(TimelineDay {
                    date: day.date,
                    hits: day.hits,
                    score: b.score,
                }),
                Err(e) => {
                    debug!(symbol = series.symbol(), date = %day.date, error = %e, "timeline day skipped");
                    None
                }
            })
            .collect()
    }

    fn transition(&self, symbol: &str, next: SymbolState) {
        let counts = {
            let mut states = self.lock_states();
            if let Some(slot) = states.get_mut(symbol) {
                *slot = next.clone();
            }
            BatchCounts::tally(states.values())
        };
        self.progress.on_transition(symbol, &next, &counts);
    }

    fn lock_states(&self) -> MutexGuard<'_, IndexMap<String, SymbolState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn now_timestamp(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    fn fallback_metadata(&self, symbol: &str, now: NaiveDateTime) -> SymbolMetadata {
        let mut meta = SymbolMetadata::inferred(symbol, now);
        if let Some(record) = self.records.get(symbol) {
            meta.name = Some(record.name.clone()).filter(|n| !n.is_empty());
            meta.sector = Some(record.sector.clone()).filter(|s| !s.is_empty());
            if let Some(market) = record.market {
                meta.market = market;
            }
        }
        meta
    }
}

/// Mirrors fetch worker events into the state map.
struct StateObserver<'a> {
    coordinator: &'a BatchCoordinator,
}

impl FetchObserver for StateObserver<'_> {
    fn on_start(&self, symbol: &str) {
        self.coordinator.transition(symbol, SymbolState::Fetching);
    }

    fn on_finish(&self, symbol: &str, outcome: &FetchOutcome) {
        // Provisional; stale fallback is settled after the pool drains.
        let next = match outcome {
            FetchOutcome::Fetched(report) => SymbolState::Fetched {
                warnings: report.warnings.clone(),
            },
            FetchOutcome::Failed { error, .. } => SymbolState::FetchFailed { error: error.clone() },
            FetchOutcome::NotStarted => SymbolState::Pending,
        };
        self.coordinator.transition(symbol, next);
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlescan_core::data::MemoryStore;

    fn err(code: ErrorCode) -> SymbolError {
        SymbolError::new(code, "X")
    }

    #[test]
    fn counts_tally_each_phase() {
        let states = [
            SymbolState::Pending,
            SymbolState::Fetching,
            SymbolState::Fetched { warnings: vec![] },
            SymbolState::Scoring,
            SymbolState::FetchFailed {
                error: err(ErrorCode::FetchNetwork),
            },
            SymbolState::ScoreFailed {
                error: err(ErrorCode::InsufficientHistory),
                warnings: vec![],
            },
        ];
        let counts = BatchCounts::tally(states.iter());
        assert_eq!(
            counts,
            BatchCounts {
                total: 6,
                pending: 1,
                fetching: 1,
                scoring: 2,
                done: 0,
                failed: 2,
            }
        );
    }

    #[test]
    fn state_labels_and_errors() {
        let failed = SymbolState::FetchFailed {
            error: err(ErrorCode::SymbolNotFound),
        };
        assert_eq!(failed.label(), "fetch_failed");
        assert!(failed.is_failed());
        assert_eq!(failed.error().map(|e| e.code), Some(ErrorCode::SymbolNotFound));
        assert!(SymbolState::Pending.error().is_none());
    }

    #[test]
    fn empty_watchlist_is_rejected() {
        let result = BatchCoordinator::new(
            ScanConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(BiasTable::builtin().unwrap()),
            vec![],
        );
        assert!(matches!(result, Err(BatchError::EmptyWatchlist)));
    }

    #[test]
    fn unknown_pattern_fails_construction() {
        let mut config = ScanConfig::default();
        config.analysis.enabled_patterns = Some(vec!["CDLBOGUS".into()]);
        let result = BatchCoordinator::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(BiasTable::builtin().unwrap()),
            vec![SymbolRecord::new("AAPL")],
        );
        let err = result.err().unwrap();
        assert_eq!(err.error_code(), ErrorCode::Config);
    }

    #[test]
    fn duplicate_records_collapse_in_order() {
        let coordinator = BatchCoordinator::new(
            ScanConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(BiasTable::builtin().unwrap()),
            vec![
                SymbolRecord::new("msft"),
                SymbolRecord::new("AAPL"),
                SymbolRecord::new("MSFT"),
            ],
        )
        .unwrap();
        assert_eq!(coordinator.symbols(), vec!["MSFT", "AAPL"]);
        assert_eq!(coordinator.counts().pending, 2);
    }

    #[test]
    fn offline_without_cache_fails_short() {
        let mut config = ScanConfig::default();
        config.fetch.offline = true;
        let mut coordinator = BatchCoordinator::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(BiasTable::builtin().unwrap()),
            vec![SymbolRecord::new("AAPL")],
        )
        .unwrap();
        coordinator.run(None).unwrap();
        let results = coordinator.results();
        assert_eq!(results[0].status, ResultStatus::ScoreFailed);
        assert_eq!(results[0].error.as_ref().map(|e| e.code), Some(ErrorCode::InsufficientHistory));
    }
}
