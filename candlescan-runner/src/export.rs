//! Result export: JSON documents and flat CSV tables.
//!
//! JSON output carries a `schema_version` so downstream tooling can detect
//! layout changes. CSV output is one row per symbol with hits folded into a
//! single column.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::batch::SymbolResult;

pub const SCHEMA_VERSION: u32 = 1;

/// Supported export formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(ExportFormat::Json),
            Some("csv") => Ok(ExportFormat::Csv),
            _ => bail!(
                "unsupported export format for {} (expected .json or .csv)",
                path.display()
            ),
        }
    }
}

#[derive(Serialize)]
struct ScanDocument<'a> {
    schema_version: u32,
    generated_at: NaiveDateTime,
    results: &'a [SymbolResult],
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize results to pretty JSON.
pub fn export_json(results: &[SymbolResult], generated_at: NaiveDateTime) -> Result<String> {
    let doc = ScanDocument {
        schema_version: SCHEMA_VERSION,
        generated_at,
        results,
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize scan results to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export one row per symbol.
///
/// Columns: symbol, name, sector, market, status, date, close, volume, score,
/// category, hits, warnings, error
pub fn export_csv(results: &[SymbolResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol", "name", "sector", "market", "status", "date", "close", "volume", "score",
        "category", "hits", "warnings", "error",
    ])?;

    for r in results {
        let hits = r
            .hits
            .iter()
            .map(|h| format!("{}({:+.2})", h.pattern, h.contribution))
            .collect::<Vec<_>>()
            .join(";");
        let warnings = r
            .warnings
            .iter()
            .map(|w| w.code.code())
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            r.symbol.as_str(),
            r.name.as_deref().unwrap_or(""),
            r.sector.as_deref().unwrap_or(""),
            r.market.code(),
            status_label(r),
            &r.date.map(|d| d.to_string()).unwrap_or_default(),
            &r.close.map(|c| format!("{c:.4}")).unwrap_or_default(),
            &r.volume.map(|v| v.to_string()).unwrap_or_default(),
            &r.score.map(|s| s.to_string()).unwrap_or_default(),
            r.category.map(|c| c.label()).unwrap_or(""),
            &hits,
            &warnings,
            r.error.as_ref().map(|e| e.code.code()).unwrap_or(""),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn status_label(r: &SymbolResult) -> &'static str {
    use crate::batch::ResultStatus;
    match r.status {
        ResultStatus::Done => "done",
        ResultStatus::FetchFailed => "fetch_failed",
        ResultStatus::ScoreFailed => "score_failed",
        ResultStatus::Pending => "pending",
    }
}

// ─── File output ────────────────────────────────────────────────────

/// Write results to `path`, picking the format from its extension.
pub fn save_results(results: &[SymbolResult], path: &Path, generated_at: NaiveDateTime) -> Result<()> {
    let body = match ExportFormat::from_path(path)? {
        ExportFormat::Json => export_json(results, generated_at)?,
        ExportFormat::Csv => export_csv(results)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
