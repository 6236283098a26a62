//! Fetch orchestrator: executes fetch plans with bounded concurrency,
//! retry/backoff for transient failures, and sentinel-zero correction.
//!
//! Each symbol is independent. A failed symbol yields a classified
//! [`SymbolError`]; only store failures abort the batch.

use crate::retry::{sleep_cancellable, RetryPolicy};
use candlescan_core::data::{
    sanitize, DataSource, FetchPlan, FetchResult, PriceSource, PriceStore, RawBar, StoreError,
    UpsertSummary, ZeroPricePolicy,
};
use candlescan_core::domain::{infer_market, Bar};
use candlescan_core::error::{ErrorCode, SymbolError};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One symbol's planned fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub symbol: String,
    pub plan: FetchPlan,
}

/// What a successful fetch did to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub plan: FetchPlan,
    /// Remote calls made (0 for a no-op plan).
    pub attempts: u32,
    /// Bars returned by the source on the final attempt.
    pub received: usize,
    pub upsert: UpsertSummary,
    /// Bars whose sentinel fields were substituted.
    pub corrected: usize,
    /// Bars removed because they could not be repaired.
    pub dropped: usize,
    pub source: DataSource,
    /// Data-quality warnings (never fatal).
    pub warnings: Vec<SymbolError>,
}

impl FetchReport {
    fn noop(plan: FetchPlan) -> Self {
        Self {
            plan,
            attempts: 0,
            received: 0,
            upsert: UpsertSummary::default(),
            corrected: 0,
            dropped: 0,
            source: DataSource::Cache,
            warnings: Vec::new(),
        }
    }
}

/// Per-symbol result of the fetch phase.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(FetchReport),
    Failed { error: SymbolError, attempts: u32 },
    /// Cancelled before the first attempt; the symbol is untouched.
    NotStarted,
}

/// Callbacks from fetch workers. Called concurrently.
pub trait FetchObserver: Sync {
    fn on_start(&self, _symbol: &str) {}
    fn on_finish(&self, _symbol: &str, _outcome: &FetchOutcome) {}
}

impl FetchObserver for () {}

/// Runs fetch jobs against a price source and merges results into the store.
pub struct FetchOrchestrator {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn PriceStore>,
    retry: RetryPolicy,
    zero_policy: ZeroPricePolicy,
}

impl FetchOrchestrator {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Arc<dyn PriceStore>,
        retry: RetryPolicy,
        zero_policy: ZeroPricePolicy,
    ) -> Self {
        Self {
            source,
            store,
            retry,
            zero_policy,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Execute `jobs` on `pool`. Outcomes are returned in job order.
    ///
    /// The inner `Err` is a store failure and should abort the batch.
    pub fn fetch_all(
        &self,
        pool: &rayon::ThreadPool,
        jobs: &[FetchJob],
        cancel: Option<&AtomicBool>,
        observer: &dyn FetchObserver,
    ) -> Vec<Result<FetchOutcome, StoreError>> {
        pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    if is_cancelled(cancel) {
                        return Ok(FetchOutcome::NotStarted);
                    }
                    observer.on_start(&job.symbol);
                    let outcome = self.fetch_one(job, cancel);
                    if let Ok(outcome) = &outcome {
                        observer.on_finish(&job.symbol, outcome);
                    }
                    outcome
                })
                .collect()
        })
    }

    /// Execute a single job with retries on the calling thread.
    pub fn fetch_one(&self, job: &FetchJob, cancel: Option<&AtomicBool>) -> Result<FetchOutcome, StoreError> {
        let symbol = job.symbol.as_str();
        let Some((start, end)) = job.plan.range() else {
            return Ok(FetchOutcome::Fetched(FetchReport::noop(job.plan)));
        };
        if is_cancelled(cancel) {
            return Ok(FetchOutcome::NotStarted);
        }

        let mut rng = rand::thread_rng();
        let mut attempts = 0;
        let mut sentinel_retried = false;

        loop {
            if attempts > 0 {
                let delay = self.retry.delay(attempts, &mut rng);
                debug!(symbol, retry = attempts, delay_ms = delay.as_millis() as u64, "backing off");
                if !sleep_cancellable(delay, cancel) {
                    return Ok(cancelled(symbol, attempts));
                }
            }
            if !self.source.is_available() {
                let err = SymbolError::new(ErrorCode::FetchSource, symbol)
                    .with_detail(format!("{} is refusing requests (circuit breaker open)", self.source.name()));
                error!(symbol, code = %err.code, "fetch failed");
                return Ok(FetchOutcome::Failed { error: err, attempts });
            }

            attempts += 1;
            let can_retry = attempts < self.retry.max_attempts();

            match self.source.fetch(symbol, start, end) {
                Ok(result) => {
                    let suspect = result.bars.iter().filter(|b| b.has_sentinel()).count();
                    if suspect > 0 && can_retry && !sentinel_retried {
                        sentinel_retried = true;
                        debug!(symbol, suspect, "sentinel prices in response, re-requesting");
                        continue;
                    }
                    return self.commit(job, start, result, attempts);
                }
                Err(e) if e.is_transient() && can_retry => {
                    debug!(symbol, attempt = attempts, error = %e, "transient fetch failure");
                }
                Err(e) => {
                    let err = SymbolError::new(e.error_code(), symbol).with_detail(e.to_string());
                    error!(symbol, attempts, code = %err.code, error = %e, "fetch failed");
                    return Ok(FetchOutcome::Failed { error: err, attempts });
                }
            }
        }
    }

    /// Sanitize, convert, and merge a successful response.
    fn commit(
        &self,
        job: &FetchJob,
        requested_start: NaiveDate,
        result: FetchResult,
        attempts: u32,
    ) -> Result<FetchOutcome, StoreError> {
        let symbol = job.symbol.as_str();
        let plan = job.plan;
        let received = result.bars.len();
        let cached = self.store.get_all(symbol)?;

        if received == 0 {
            if cached.is_empty() {
                let err = SymbolError::new(ErrorCode::SymbolNotFound, symbol)
                    .with_detail(format!("{} returned no bars", self.source.name()));
                error!(symbol, code = %err.code, "no data for symbol");
                return Ok(FetchOutcome::Failed { error: err, attempts });
            }
            // Nothing new in the range; the cache stays authoritative.
            self.store.record_coverage(symbol, requested_start)?;
            debug!(symbol, "no new bars");
            return Ok(FetchOutcome::Fetched(FetchReport {
                attempts,
                source: result.source,
                ..FetchReport::noop(plan)
            }));
        }

        let first_date = result.bars.iter().map(|b| b.date).min();
        let prior_close = first_date.and_then(|first| {
            cached
                .bars()
                .iter()
                .rev()
                .find(|b| b.date < first)
                .map(|b| b.close)
        });
        let report = sanitize(result.bars, prior_close, self.zero_policy);

        let mut warnings = Vec::new();
        if !report.is_clean() {
            warn!(
                symbol,
                corrected = report.corrected,
                dropped = report.dropped,
                policy = ?self.zero_policy,
                "sentinel prices in fetched bars"
            );
            warnings.push(SymbolError::new(ErrorCode::SentinelZeros, symbol).with_detail(format!(
                "{} bar(s) corrected, {} dropped",
                report.corrected, report.dropped
            )));
        }

        let timezone = result
            .timezone
            .unwrap_or_else(|| infer_market(symbol).default_timezone().to_string());
        let bars: Vec<Bar> = report.bars.iter().map(|raw| to_bar(symbol, raw, &timezone)).collect();

        let upsert = self.store.upsert(symbol, &bars)?;
        self.store.record_coverage(symbol, requested_start)?;
        info!(
            symbol,
            attempts,
            received,
            inserted = upsert.inserted,
            replaced = upsert.replaced,
            "fetched bars"
        );

        Ok(FetchOutcome::Fetched(FetchReport {
            plan,
            attempts,
            received,
            upsert,
            corrected: report.corrected,
            dropped: report.dropped,
            source: result.source,
            warnings,
        }))
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

fn cancelled(symbol: &str, attempts: u32) -> FetchOutcome {
    FetchOutcome::Failed {
        error: SymbolError::new(ErrorCode::FetchCancelled, symbol),
        attempts,
    }
}

pub(crate) fn to_bar(symbol: &str, raw: &RawBar, timezone: &str) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        date: raw.date,
        open: raw.open,
        high: raw.high,
        low: raw.low,
        close: raw.close,
        volume: raw.volume,
        timezone: timezone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlescan_core::data::{CircuitBreaker, DataError, MemoryStore};
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    type Script = VecDeque<Result<Vec<RawBar>, DataError>>;

    /// Replays canned responses per symbol; unscripted calls are "not found".
    #[derive(Default)]
    struct ScriptedSource {
        scripts: Mutex<HashMap<String, Script>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn with(symbol: &str, responses: Vec<Result<Vec<RawBar>, DataError>>) -> Self {
            let source = Self::default();
            source.push(symbol, responses);
            source
        }

        fn push(&self, symbol: &str, responses: Vec<Result<Vec<RawBar>, DataError>>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(symbol.to_string())
                .or_default()
                .extend(responses);
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PriceSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, symbol: &str, _start: NaiveDate, _end: NaiveDate) -> Result<FetchResult, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(symbol)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| {
                    Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    })
                });
            next.map(|bars| FetchResult {
                symbol: symbol.to_string(),
                bars,
                timezone: None,
                source: DataSource::Synthetic,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    /// Shares a circuit breaker the way a real provider does: timeouts are
    /// recorded against the failing symbol, successes reset it.
    struct GuardedSource {
        breaker: Arc<CircuitBreaker>,
        unreachable: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl PriceSource for GuardedSource {
        fn name(&self) -> &str {
            "guarded"
        }

        fn fetch(&self, symbol: &str, _start: NaiveDate, _end: NaiveDate) -> Result<FetchResult, DataError> {
            if !self.breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            self.calls.lock().unwrap().push(symbol.to_string());
            if self.unreachable.contains(symbol) {
                self.breaker.record_failure(symbol);
                return Err(DataError::Timeout("connect timed out".into()));
            }
            self.breaker.record_success();
            Ok(FetchResult {
                symbol: symbol.to_string(),
                bars: vec![raw(2, 100.0), raw(3, 101.0)],
                timezone: None,
                source: DataSource::Synthetic,
            })
        }

        fn is_available(&self) -> bool {
            self.breaker.is_allowed()
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn raw(day: u32, close: f64) -> RawBar {
        RawBar {
            date: d(day),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    fn job(symbol: &str) -> FetchJob {
        FetchJob {
            symbol: symbol.into(),
            plan: FetchPlan::Full { start: d(1), end: d(31) },
        }
    }

    fn orchestrator(source: Arc<ScriptedSource>, store: Arc<MemoryStore>) -> FetchOrchestrator {
        FetchOrchestrator::new(source, store, RetryPolicy::immediate(2), ZeroPricePolicy::CarryForward)
    }

    fn fetched(outcome: FetchOutcome) -> FetchReport {
        match outcome {
            FetchOutcome::Fetched(report) => report,
            other => panic!("expected Fetched, got {other:?}"),
        }
    }

    fn failed(outcome: FetchOutcome) -> (SymbolError, u32) {
        match outcome {
            FetchOutcome::Failed { error, attempts } => (error, attempts),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn transient_failure_is_retried() {
        let source = Arc::new(ScriptedSource::with(
            "AAPL",
            vec![Err(DataError::Timeout("slow".into())), Ok(vec![raw(2, 100.0), raw(3, 101.0)])],
        ));
        let store = Arc::new(MemoryStore::new());
        let report = fetched(orchestrator(source.clone(), store.clone()).fetch_one(&job("AAPL"), None).unwrap());

        assert_eq!(report.attempts, 2);
        assert_eq!(report.upsert.inserted, 2);
        assert_eq!(store.get_all("AAPL").unwrap().len(), 2);
        assert_eq!(store.manifest("AAPL").unwrap().unwrap().coverage_start, Some(d(1)));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn exhausted_retries_fail_with_network_code() {
        let source = Arc::new(ScriptedSource::with(
            "XXXX",
            vec![
                Err(DataError::ServerError { status: 503 }),
                Err(DataError::ServerError { status: 503 }),
                Err(DataError::ServerError { status: 503 }),
            ],
        ));
        let store = Arc::new(MemoryStore::new());
        let (err, attempts) = failed(orchestrator(source.clone(), store.clone()).fetch_one(&job("XXXX"), None).unwrap());

        assert_eq!(err.code, ErrorCode::FetchNetwork);
        assert_eq!(attempts, 3);
        assert!(store.get_all("XXXX").unwrap().is_empty());
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let source = Arc::new(ScriptedSource::default());
        let store = Arc::new(MemoryStore::new());
        let (err, attempts) = failed(orchestrator(source.clone(), store).fetch_one(&job("NOPE"), None).unwrap());

        assert_eq!(err.code, ErrorCode::SymbolNotFound);
        assert_eq!(attempts, 1);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn persistent_sentinel_zeros_are_corrected_with_warning() {
        let mut bad = raw(3, 101.0);
        bad.open = 0.0;
        let response = vec![raw(2, 100.0), bad];
        let source = Arc::new(ScriptedSource::with("AAPL", vec![Ok(response.clone()), Ok(response)]));
        let store = Arc::new(MemoryStore::new());
        let report = fetched(orchestrator(source.clone(), store.clone()).fetch_one(&job("AAPL"), None).unwrap());

        assert_eq!(report.attempts, 2);
        assert_eq!(report.corrected, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, ErrorCode::SentinelZeros);

        let series = store.get_all("AAPL").unwrap();
        assert_eq!(series.bars()[1].open, 100.0);
        assert!(series.bars().iter().all(|b| b.has_valid_prices()));
    }

    #[test]
    fn sentinel_cleared_by_retry_is_clean() {
        let mut bad = raw(3, 101.0);
        bad.close = f64::NAN;
        let source = Arc::new(ScriptedSource::with(
            "AAPL",
            vec![Ok(vec![raw(2, 100.0), bad]), Ok(vec![raw(2, 100.0), raw(3, 101.0)])],
        ));
        let store = Arc::new(MemoryStore::new());
        let report = fetched(orchestrator(source, store).fetch_one(&job("AAPL"), None).unwrap());
        assert_eq!(report.corrected, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn empty_response_without_cache_is_not_found() {
        let source = Arc::new(ScriptedSource::with("NEW", vec![Ok(vec![])]));
        let store = Arc::new(MemoryStore::new());
        let (err, _) = failed(orchestrator(source, store).fetch_one(&job("NEW"), None).unwrap());
        assert_eq!(err.code, ErrorCode::SymbolNotFound);
    }

    #[test]
    fn empty_delta_with_cache_is_no_new_data() {
        let source = Arc::new(ScriptedSource::with("AAPL", vec![Ok(vec![])]));
        let store = Arc::new(MemoryStore::new());
        store
            .upsert("AAPL", &[to_bar("AAPL", &raw(2, 100.0), "America/New_York")])
            .unwrap();
        let delta = FetchJob {
            symbol: "AAPL".into(),
            plan: FetchPlan::Delta { start: d(3), end: d(3) },
        };
        let report = fetched(orchestrator(source, store.clone()).fetch_one(&delta, None).unwrap());
        assert_eq!(report.received, 0);
        assert_eq!(report.attempts, 1);
        assert_eq!(store.get_all("AAPL").unwrap().len(), 1);
    }

    #[test]
    fn noop_plan_makes_no_calls() {
        let source = Arc::new(ScriptedSource::default());
        let store = Arc::new(MemoryStore::new());
        let noop = FetchJob {
            symbol: "AAPL".into(),
            plan: FetchPlan::NoOp,
        };
        let report = fetched(orchestrator(source.clone(), store).fetch_one(&noop, None).unwrap());
        assert_eq!(report.attempts, 0);
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let source = Arc::new(ScriptedSource::with("AAPL", vec![Ok(vec![raw(2, 100.0)])]));
        let store = Arc::new(MemoryStore::new());
        let cancel = AtomicBool::new(true);
        let outcome = orchestrator(source.clone(), store).fetch_one(&job("AAPL"), Some(&cancel)).unwrap();
        assert_eq!(outcome, FetchOutcome::NotStarted);
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn fetch_all_keeps_job_order_and_isolates_failures() {
        let source = Arc::new(ScriptedSource::default());
        for sym in ["AAA", "CCC", "DDD"] {
            source.push(sym, vec![Ok(vec![raw(2, 50.0), raw(3, 51.0)])]);
        }
        source.push("BBB", vec![Err(DataError::AuthenticationRequired("crumb".into()))]);
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(source, store.clone());
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();

        let jobs: Vec<_> = ["AAA", "BBB", "CCC", "DDD"].into_iter().map(job).collect();
        let outcomes = orch.fetch_all(&pool, &jobs, None, &());

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0], Ok(FetchOutcome::Fetched(_))));
        let (err, _) = failed(outcomes[1].clone().unwrap());
        assert_eq!(err.code, ErrorCode::FetchSource);
        assert!(matches!(outcomes[2], Ok(FetchOutcome::Fetched(_))));
        assert!(matches!(outcomes[3], Ok(FetchOutcome::Fetched(_))));
        assert_eq!(store.get_all("DDD").unwrap().len(), 2);
    }

    #[test]
    fn one_unreachable_symbol_does_not_lock_out_the_rest() {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let source = Arc::new(GuardedSource {
            breaker: breaker.clone(),
            unreachable: HashSet::from(["XXXX".to_string()]),
            calls: Mutex::new(Vec::new()),
        });
        let store = Arc::new(MemoryStore::new());
        let orch = FetchOrchestrator::new(
            source.clone(),
            store.clone(),
            RetryPolicy::immediate(2),
            ZeroPricePolicy::CarryForward,
        );
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();

        let jobs: Vec<_> = ["XXXX", "AAPL", "MSFT"].into_iter().map(job).collect();
        let outcomes = orch.fetch_all(&pool, &jobs, None, &());

        let (err, attempts) = failed(outcomes[0].clone().unwrap());
        assert_eq!(err.code, ErrorCode::FetchNetwork);
        assert_eq!(attempts, 3);
        assert!(matches!(outcomes[1], Ok(FetchOutcome::Fetched(_))));
        assert!(matches!(outcomes[2], Ok(FetchOutcome::Fetched(_))));
        assert_eq!(store.get_all("AAPL").unwrap().len(), 2);

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["XXXX", "XXXX", "XXXX", "AAPL", "MSFT"]);
        assert!(breaker.is_allowed());
    }
}
