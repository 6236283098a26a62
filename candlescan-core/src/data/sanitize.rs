//! Sentinel-zero correction for freshly fetched bars.
//!
//! Price sources occasionally report `0` (or omit) an OHLC field. Such values
//! are never trusted at face value: they are repaired according to a
//! [`ZeroPricePolicy`] and the number of touched bars is reported so the caller
//! can attach a data-quality warning.

use super::provider::RawBar;
use serde::{Deserialize, Serialize};

/// How sentinel-invalid OHLC fields are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPricePolicy {
    /// Replace invalid fields with the nearest valid prior close. The first
    /// bar of a batch with no prior close borrows its own largest valid field.
    #[default]
    CarryForward,
    /// Replace invalid fields with the smallest positive OHLC value in the batch.
    MinPositive,
    /// Keep only bars whose fields are all valid.
    Flag,
}

/// Outcome of sanitizing one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeReport {
    pub bars: Vec<RawBar>,
    /// Bars whose fields were substituted.
    pub corrected: usize,
    /// Bars that could not be repaired and were removed.
    pub dropped: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.corrected == 0 && self.dropped == 0
    }
}

fn is_valid(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Sanitize a date-ordered batch.
///
/// `prior_close` is the close of the last cached bar before the batch, used as
/// the carry-forward seed.
pub fn sanitize(bars: Vec<RawBar>, prior_close: Option<f64>, policy: ZeroPricePolicy) -> SanitizeReport {
    let mut corrected = 0;
    let mut dropped = 0;
    let mut out = Vec::with_capacity(bars.len());

    let batch_min = bars
        .iter()
        .flat_map(|b| [b.open, b.high, b.low, b.close])
        .filter(|v| is_valid(*v))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))));

    let mut last_close = prior_close.filter(|c| is_valid(*c));

    for mut bar in bars {
        if !bar.has_sentinel() {
            last_close = Some(bar.close);
            out.push(bar);
            continue;
        }

        let own_max = [bar.open, bar.high, bar.low, bar.close]
            .into_iter()
            .filter(|v| is_valid(*v))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

        let fill = match policy {
            ZeroPricePolicy::CarryForward => last_close.or(own_max),
            ZeroPricePolicy::MinPositive => batch_min,
            ZeroPricePolicy::Flag => None,
        };

        let Some(fill) = fill else {
            dropped += 1;
            continue;
        };

        for field in [&mut bar.open, &mut bar.high, &mut bar.low, &mut bar.close] {
            if !is_valid(*field) {
                *field = fill;
            }
        }
        // Substitution may break the OHLC envelope.
        bar.high = bar.high.max(bar.open).max(bar.close).max(bar.low);
        bar.low = bar.low.min(bar.open).min(bar.close);

        corrected += 1;
        last_close = Some(bar.close);
        out.push(bar);
    }

    SanitizeReport {
        bars: out,
        corrected,
        dropped,
    }
}
