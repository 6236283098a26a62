//! Freshness & fetch planning.
//!
//! Given what the store holds for a symbol, a lookback window, and "now",
//! decide whether a remote fetch is needed and which contiguous date range
//! to request. The planner never touches the network.

use super::store::{PriceStore, StoreError};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to request for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchPlan {
    /// Cache is fresh and long enough. Not an error.
    NoOp,
    /// Nothing cached (or forced): fetch the whole window.
    Full { start: NaiveDate, end: NaiveDate },
    /// Fill the gap after and/or before the cached range.
    Delta { start: NaiveDate, end: NaiveDate },
}

impl FetchPlan {
    /// Requested range, if any.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            FetchPlan::NoOp => None,
            FetchPlan::Full { start, end } | FetchPlan::Delta { start, end } => Some((start, end)),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, FetchPlan::NoOp)
    }
}

/// Planner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    /// History window length in calendar days.
    pub lookback_days: i64,
    /// Weekday sessions the cache may lag behind before it counts as stale.
    pub freshness_tolerance_sessions: u32,
    /// Ignore the cache and fetch the whole window.
    pub force_refresh: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            freshness_tolerance_sessions: 0,
            force_refresh: false,
        }
    }
}

/// Latest weekday on or before `date`.
pub fn last_weekday_on_or_before(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// Step back `sessions` weekdays from a weekday.
fn weekdays_before(date: NaiveDate, sessions: u32) -> NaiveDate {
    let mut d = date;
    for _ in 0..sessions {
        d = last_weekday_on_or_before(d - Duration::days(1));
    }
    d
}

/// Pure planning decision from cache bounds.
///
/// `cached` is `(first, last)` of the stored series; `coverage_start` is the
/// earliest start ever requested for the symbol.
pub fn plan_for(
    cached: Option<(NaiveDate, NaiveDate)>,
    coverage_start: Option<NaiveDate>,
    now: NaiveDate,
    opts: &PlannerOptions,
) -> FetchPlan {
    let window_start = now - Duration::days(opts.lookback_days.max(1));

    let Some((first, latest)) = cached else {
        return FetchPlan::Full {
            start: window_start,
            end: now,
        };
    };
    if opts.force_refresh {
        return FetchPlan::Full {
            start: window_start,
            end: now,
        };
    }

    let expected = weekdays_before(last_weekday_on_or_before(now), opts.freshness_tolerance_sessions);
    let fresh = latest >= now || latest >= expected;
    let history_ok = first <= window_start || coverage_start.is_some_and(|c| c <= window_start);

    match (fresh, history_ok) {
        (true, true) => FetchPlan::NoOp,
        (false, true) => FetchPlan::Delta {
            start: latest + Duration::days(1),
            end: now,
        },
        (true, false) => FetchPlan::Delta {
            start: window_start,
            end: first - Duration::days(1),
        },
        // Backfill and forward gap merged into one contiguous request.
        (false, false) => FetchPlan::Delta {
            start: window_start,
            end: now,
        },
    }
}

/// Plan a fetch for `symbol` against the store.
pub fn plan_symbol(
    store: &dyn PriceStore,
    symbol: &str,
    now: NaiveDate,
    opts: &PlannerOptions,
) -> Result<FetchPlan, StoreError> {
    // Dates come from the bars themselves; the manifest only carries coverage.
    let series = store.get_all(symbol)?;
    let cached = series.first_date().zip(series.last_date());
    let coverage_start = store.manifest(symbol)?.and_then(|m| m.coverage_start);

    let plan = plan_for(cached, coverage_start, now, opts);
    debug!(symbol, ?cached, ?plan, "planned fetch");
    Ok(plan)
}
