//! Bias table: pattern identifier to signed base weight.
//!
//! Loaded once per run from CSV (`pattern,variant,weight,name`) and shared
//! immutably. A pattern may carry separate bullish, bearish, and neutral rows.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const BUILTIN_CSV: &str = include_str!("../../resources/cdl_bias.csv");

pub const WEIGHT_MIN: i32 = -5;
pub const WEIGHT_MAX: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("no bias entry for pattern {pattern}")]
    MissingBias { pattern: String },

    #[error("bias weight {weight} for {pattern} is outside [-5, 5]")]
    WeightOutOfRange { pattern: String, weight: i32 },

    #[error("bias table {path}: {reason}")]
    Load { path: String, reason: String },
}

impl ScoreError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ScoreError::MissingBias { .. } => ErrorCode::BiasMissing,
            ScoreError::WeightOutOfRange { .. } | ScoreError::Load { .. } => ErrorCode::Config,
        }
    }
}

/// Direction a bias row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Bullish,
    Bearish,
    Neutral,
}

impl Variant {
    /// Variant matching the sign of a raw recognizer value.
    pub fn for_value(value: i32) -> Self {
        match value.signum() {
            1 => Variant::Bullish,
            -1 => Variant::Bearish,
            _ => Variant::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasEntry {
    pub pattern: String,
    pub variant: Variant,
    pub weight: i32,
    #[serde(default)]
    pub name: String,
}

/// Immutable lookup built from bias rows.
#[derive(Debug, Clone, Default)]
pub struct BiasTable {
    // Rows per pattern in file order.
    entries: HashMap<String, Vec<BiasEntry>>,
}

impl BiasTable {
    /// The table shipped with the crate, covering all 61 recognizers.
    pub fn builtin() -> Result<Self, ScoreError> {
        Self::from_csv_str(BUILTIN_CSV, "<builtin>")
    }

    pub fn from_file(path: &Path) -> Result<Self, ScoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScoreError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_csv_str(&content, &path.display().to_string())
    }

    pub fn from_csv_str(content: &str, origin: &str) -> Result<Self, ScoreError> {
        // Tolerate a UTF-8 BOM from spreadsheet exports.
        let content = content.trim_start_matches('\u{feff}');
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.deserialize::<BiasEntry>() {
            let entry = record.map_err(|e| ScoreError::Load {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
            rows.push(entry);
        }
        Self::from_entries(rows)
    }

    pub fn from_entries(rows: impl IntoIterator<Item = BiasEntry>) -> Result<Self, ScoreError> {
        let mut entries: HashMap<String, Vec<BiasEntry>> = HashMap::new();
        for mut row in rows {
            if !(WEIGHT_MIN..=WEIGHT_MAX).contains(&row.weight) {
                return Err(ScoreError::WeightOutOfRange {
                    pattern: row.pattern,
                    weight: row.weight,
                });
            }
            row.pattern = row.pattern.to_ascii_uppercase();
            entries.entry(row.pattern.clone()).or_default().push(row);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.entries.contains_key(pattern)
    }

    /// Entry for `pattern` given a raw value: the row whose variant matches
    /// the value's sign, else the neutral row, else the first row listed.
    pub fn lookup(&self, pattern: &str, value: i32) -> Result<&BiasEntry, ScoreError> {
        let rows = self
            .entries
            .get(pattern)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| ScoreError::MissingBias {
                pattern: pattern.to_string(),
            })?;
        let wanted = Variant::for_value(value);
        let entry = rows
            .iter()
            .find(|r| r.variant == wanted)
            .or_else(|| rows.iter().find(|r| r.variant == Variant::Neutral))
            .unwrap_or(&rows[0]);
        Ok(entry)
    }
}
