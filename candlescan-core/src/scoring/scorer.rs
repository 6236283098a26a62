//! Scoring engine: weight hits, sum, clip, explain.

use super::bias::{BiasTable, ScoreError};
use crate::patterns::{PatternHit, PatternId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Clip and highlight bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub clip_min: i32,
    pub clip_max: i32,
    pub highlight_pos: i32,
    pub highlight_neg: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            clip_min: -5,
            clip_max: 5,
            highlight_pos: 4,
            highlight_neg: -4,
        }
    }
}

/// A hit with its weight applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredHit {
    pub pattern: PatternId,
    pub value: i32,
    pub strength: f64,
    /// Weight from the bias table, as listed.
    pub base_weight: i32,
    /// `sign(value) * |base_weight| * strength`.
    pub contribution: f64,
    pub name: String,
}

/// Aggregate score plus its explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Ordered by descending |contribution|, ties by pattern id.
    pub hits: Vec<ScoredHit>,
    /// Sum before rounding and clipping.
    pub raw_total: f64,
    pub score: i32,
}

/// Display bucket for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    StrongBullish,
    MildBullish,
    Neutral,
    MildBearish,
    StrongBearish,
}

impl ScoreCategory {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 3 => ScoreCategory::StrongBullish,
            s if s >= 1 => ScoreCategory::MildBullish,
            s if s <= -3 => ScoreCategory::StrongBearish,
            s if s <= -1 => ScoreCategory::MildBearish,
            _ => ScoreCategory::Neutral,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreCategory::StrongBullish => "Strong+",
            ScoreCategory::MildBullish => "Mild+",
            ScoreCategory::Neutral => "Neutral",
            ScoreCategory::MildBearish => "Mild-",
            ScoreCategory::StrongBearish => "Strong-",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            ScoreCategory::StrongBullish => "↑↑",
            ScoreCategory::MildBullish => "↑",
            ScoreCategory::Neutral => "→",
            ScoreCategory::MildBearish => "↓",
            ScoreCategory::StrongBearish => "↓↓",
        }
    }

    /// Badge such as `↑↑ Strong+ (+4)`.
    pub fn badge(score: i32) -> String {
        let category = Self::from_score(score);
        format!("{} {} ({score:+})", category.arrow(), category.label())
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable scoring context shared across workers.
#[derive(Debug, Clone)]
pub struct Scorer {
    table: Arc<BiasTable>,
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(table: Arc<BiasTable>, config: ScoringConfig) -> Self {
        Self { table, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn table(&self) -> &BiasTable {
        &self.table
    }

    /// Weight a single hit.
    pub fn score_hit(&self, hit: &PatternHit) -> Result<ScoredHit, ScoreError> {
        let entry = self.table.lookup(hit.pattern.as_str(), hit.value)?;
        let strength = hit.strength();
        let contribution = f64::from(hit.sign()) * f64::from(entry.weight.abs()) * strength;
        Ok(ScoredHit {
            pattern: hit.pattern,
            value: hit.value,
            strength,
            base_weight: entry.weight,
            contribution,
            name: entry.name.clone(),
        })
    }

    /// Score a symbol's final-bar hits.
    ///
    /// Any hit without a bias entry fails the whole symbol rather than
    /// counting as zero.
    pub fn score(&self, hits: &[PatternHit]) -> Result<ScoreBreakdown, ScoreError> {
        let mut scored = hits.iter().map(|h| self.score_hit(h)).collect::<Result<Vec<_>, _>>()?;
        scored.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        let raw_total: f64 = scored.iter().map(|h| h.contribution).sum();
        Ok(ScoreBreakdown {
            hits: scored,
            raw_total,
            score: self.clip(raw_total),
        })
    }

    /// Round half to even, then clamp to the configured bounds.
    pub fn clip(&self, total: f64) -> i32 {
        let rounded = total.round_ties_even();
        let clamped = rounded.clamp(f64::from(self.config.clip_min), f64::from(self.config.clip_max));
        clamped as i32
    }

    pub fn is_highlighted(&self, score: i32) -> bool {
        score >= self.config.highlight_pos || score <= self.config.highlight_neg
    }
}
