//! Pattern engine: runs the enabled recognizers against a series and keeps
//! the non-zero outputs on the final bar.

use super::candle::Candles;
use super::registry::{self, PatternId, Recognizer, RECOGNIZERS};
use crate::domain::{Bar, PriceSeries};
use crate::error::ErrorCode;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("insufficient history: need {need} bars, got {got}")]
    InsufficientHistory { need: usize, got: usize },

    #[error("bar on {date} has non-positive or non-finite prices")]
    InvalidBar { date: NaiveDate },

    #[error("unknown pattern '{0}'")]
    UnknownPattern(String),
}

impl PatternError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            PatternError::InsufficientHistory { .. } => ErrorCode::InsufficientHistory,
            PatternError::InvalidBar { .. } => ErrorCode::PatternEvaluation,
            PatternError::UnknownPattern(_) => ErrorCode::Config,
        }
    }
}

/// One recognizer's non-zero output for the evaluated bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternHit {
    pub pattern: PatternId,
    /// Raw signed magnitude, conventionally ±100 or ±200.
    pub value: i32,
}

impl PatternHit {
    /// `|value| / 100`, computed for any magnitude.
    pub fn strength(&self) -> f64 {
        f64::from(self.value.unsigned_abs()) / 100.0
    }

    pub fn sign(&self) -> i32 {
        self.value.signum()
    }
}

/// Hits found on one historical bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitDay {
    pub date: NaiveDate,
    pub hits: Vec<PatternHit>,
}

/// The set of active recognizers for a run.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    active: Vec<&'static Recognizer>,
    min_bars: usize,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::all()
    }
}

impl PatternEngine {
    /// All 61 recognizers.
    pub fn all() -> Self {
        Self::from_active(RECOGNIZERS.iter().collect())
    }

    /// Restrict to `enabled` when given. Names are matched case-insensitively;
    /// an unknown name is an error rather than silently ignored.
    pub fn new(enabled: Option<&[String]>) -> Result<Self, PatternError> {
        let Some(names) = enabled else {
            return Ok(Self::all());
        };
        let mut active: Vec<&'static Recognizer> = Vec::with_capacity(names.len());
        for name in names {
            let rec = registry::find(name).ok_or_else(|| PatternError::UnknownPattern(name.clone()))?;
            if !active.iter().any(|r| r.id == rec.id) {
                active.push(rec);
            }
        }
        // Keep table order so hit lists are stable regardless of config order.
        active.sort_by_key(|r| r.id);
        Ok(Self::from_active(active))
    }

    fn from_active(active: Vec<&'static Recognizer>) -> Self {
        let min_bars = active.iter().map(|r| r.lookback).max().unwrap_or(0) + 1;
        Self { active, min_bars }
    }

    pub fn active(&self) -> &[&'static Recognizer] {
        &self.active
    }

    /// Shortest series the active set can evaluate.
    pub fn min_bars(&self) -> usize {
        self.min_bars
    }

    /// Hits on the final bar of `series`.
    pub fn evaluate(&self, series: &PriceSeries) -> Result<Vec<PatternHit>, PatternError> {
        self.evaluate_bars(series.bars())
    }

    /// Hits on the last element of `bars`.
    pub fn evaluate_bars(&self, bars: &[Bar]) -> Result<Vec<PatternHit>, PatternError> {
        if bars.len() < self.min_bars {
            return Err(PatternError::InsufficientHistory {
                need: self.min_bars,
                got: bars.len(),
            });
        }
        self.validate_window(bars, bars.len() - 1)?;
        Ok(self.hits_at(&Candles::new(bars), bars.len() - 1))
    }

    /// Hits for each of the last `days` evaluable bars, oldest first. Days
    /// without hits are omitted.
    pub fn evaluate_history(&self, series: &PriceSeries, days: usize) -> Result<Vec<HitDay>, PatternError> {
        let bars = series.bars();
        if bars.len() < self.min_bars {
            return Err(PatternError::InsufficientHistory {
                need: self.min_bars,
                got: bars.len(),
            });
        }
        let first_evaluable = self.min_bars - 1;
        let from = bars.len().saturating_sub(days).max(first_evaluable);
        let candles = Candles::new(bars);

        let mut out = Vec::new();
        for idx in from..bars.len() {
            if self.validate_window(bars, idx).is_err() {
                continue;
            }
            let hits = self.hits_at(&candles, idx);
            if !hits.is_empty() {
                out.push(HitDay {
                    date: bars[idx].date,
                    hits,
                });
            }
        }
        Ok(out)
    }

    fn validate_window(&self, bars: &[Bar], idx: usize) -> Result<(), PatternError> {
        let start = (idx + 1).saturating_sub(self.min_bars);
        match bars[start..=idx].iter().find(|b| !b.has_valid_prices()) {
            Some(bad) => Err(PatternError::InvalidBar { date: bad.date }),
            None => Ok(()),
        }
    }

    fn hits_at(&self, candles: &Candles, idx: usize) -> Vec<PatternHit> {
        self.active
            .iter()
            .filter_map(|rec| {
                let value = (rec.detect)(candles, idx);
                (value != 0).then_some(PatternHit {
                    pattern: rec.id,
                    value,
                })
            })
            .collect()
    }
}
