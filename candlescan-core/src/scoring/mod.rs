//! Bias-weighted scoring of pattern hits.

pub mod bias;
pub mod scorer;

pub use bias::{BiasEntry, BiasTable, ScoreError, Variant};
pub use scorer::{ScoreBreakdown, ScoreCategory, ScoredHit, Scorer, ScoringConfig};
