//! Bar and PriceSeries: the daily market data units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OHLCV bar for a single symbol on a single trading session.
///
/// Identified uniquely by `(symbol, date)`. `timezone` is the IANA name of the
/// exchange the session belongs to (e.g. `America/New_York`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub timezone: String,
}

impl Bar {
    /// Returns true if every OHLC field is finite and strictly positive.
    pub fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        self.has_valid_prices()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Ascending, duplicate-free sequence of bars for one symbol.
///
/// A read-only view: it is rebuilt from the store after every upsert, never
/// patched in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series from bars in any order.
    ///
    /// Bars for other symbols are ignored. When two bars share a date the one
    /// appearing later in `bars` wins.
    pub fn from_bars(symbol: &str, bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
        for bar in bars.into_iter().filter(|b| b.symbol == symbol) {
            by_date.insert(bar.date, bar);
        }
        Self {
            symbol: symbol.to_string(),
            bars: by_date.into_values().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    /// The final bar, the only position pattern hits are scored against.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last().map(|b| b.date)
    }

    /// Prefix of the series ending at (and including) `index`.
    pub fn prefix(&self, index: usize) -> &[Bar] {
        let end = (index + 1).min(self.bars.len());
        &self.bars[..end]
    }
}
