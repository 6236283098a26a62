//! Watchlist loading from CSV.
//!
//! Accepts either a header row naming the columns (`ticker`/`symbol`/`code`,
//! `name`, `sector`, `market`) or headerless rows read positionally as
//! symbol, name, sector.

use candlescan_core::domain::{normalize_symbol, Market, SymbolRecord};
use candlescan_core::error::ErrorCode;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("watchlist not found: {0}")]
    NotFound(PathBuf),

    #[error("watchlist has no symbols")]
    Empty,

    #[error("watchlist could not be read: {0}")]
    Unreadable(String),
}

impl WatchlistError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            WatchlistError::NotFound(_) => ErrorCode::CsvNotFound,
            WatchlistError::Empty => ErrorCode::CsvEmpty,
            WatchlistError::Unreadable(_) => ErrorCode::CsvUnknown,
        }
    }
}

const SYMBOL_HEADERS: [&str; 3] = ["ticker", "symbol", "code"];

/// Column positions for one watchlist layout.
#[derive(Debug, Clone, Copy)]
struct Columns {
    symbol: usize,
    name: Option<usize>,
    sector: Option<usize>,
    market: Option<usize>,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        symbol: 0,
        name: Some(1),
        sector: Some(2),
        market: None,
    };

    /// Column layout from a header row, if it is one.
    fn from_header(row: &csv::StringRecord) -> Option<Self> {
        Some(Columns {
            symbol: column(row, &SYMBOL_HEADERS)?,
            name: column(row, &["name"]),
            sector: column(row, &["sector"]),
            market: column(row, &["market"]),
        })
    }
}

fn column(row: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    row.iter()
        .position(|cell| names.iter().any(|n| cell.eq_ignore_ascii_case(n)))
}

pub fn load_watchlist(path: &Path) -> Result<Vec<SymbolRecord>, WatchlistError> {
    if !path.is_file() {
        return Err(WatchlistError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| WatchlistError::Unreadable(e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|e| WatchlistError::Unreadable(e.to_string()))?;
    let records = parse_watchlist(&content)?;
    debug!(path = %path.display(), symbols = records.len(), "loaded watchlist");
    Ok(records)
}

/// Parse watchlist CSV text. Blank symbols are skipped and duplicates keep
/// their first occurrence.
pub fn parse_watchlist(content: &str) -> Result<Vec<SymbolRecord>, WatchlistError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = reader.records();
    let Some(first) = rows.next() else {
        return Err(WatchlistError::Empty);
    };
    let first = first.map_err(|e| WatchlistError::Unreadable(e.to_string()))?;

    let (columns, pending) = match Columns::from_header(&first) {
        Some(columns) => (columns, None),
        None => (Columns::POSITIONAL, Some(first)),
    };

    let mut out: IndexMap<String, SymbolRecord> = IndexMap::new();
    let mut push = |row: &csv::StringRecord| {
        if let Some(record) = to_record(row, columns) {
            out.entry(record.symbol.clone()).or_insert(record);
        }
    };
    if let Some(row) = pending {
        push(&row);
    }
    for row in rows {
        let row = row.map_err(|e| WatchlistError::Unreadable(e.to_string()))?;
        push(&row);
    }

    if out.is_empty() {
        return Err(WatchlistError::Empty);
    }
    Ok(out.into_values().collect())
}

fn to_record(row: &csv::StringRecord, columns: Columns) -> Option<SymbolRecord> {
    let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or("").to_string();
    let symbol = normalize_symbol(row.get(columns.symbol)?);
    if symbol.is_empty() {
        return None;
    }
    Some(SymbolRecord {
        symbol,
        name: cell(columns.name),
        sector: cell(columns.sector),
        market: columns.market.and_then(|i| row.get(i)).and_then(Market::parse),
    })
}

/// Records for symbols given directly on the command line.
pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<Vec<SymbolRecord>, WatchlistError> {
    let mut out: IndexMap<String, SymbolRecord> = IndexMap::new();
    for s in symbols {
        let record = SymbolRecord::new(s.as_ref());
        if !record.symbol.is_empty() {
            out.entry(record.symbol.clone()).or_insert(record);
        }
    }
    if out.is_empty() {
        return Err(WatchlistError::Empty);
    }
    Ok(out.into_values().collect())
}
