//! Stable error codes and the per-symbol error record.
//!
//! Every terminal per-symbol failure is reported as a [`SymbolError`] carrying
//! an [`ErrorCode`]. Codes are stable strings (`E-YF-404`, `E-DATA-SHORT`, ...)
//! suitable for logs, exports, and scripted retry decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog of user-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "E-FETCH-NET")]
    FetchNetwork,
    #[serde(rename = "E-YF-404")]
    SymbolNotFound,
    #[serde(rename = "E-FETCH-SOURCE")]
    FetchSource,
    #[serde(rename = "E-FETCH-CANCELLED")]
    FetchCancelled,
    #[serde(rename = "E-DATA-SHORT")]
    InsufficientHistory,
    #[serde(rename = "E-DATA-ZERO")]
    SentinelZeros,
    #[serde(rename = "E-DATA-STALE")]
    StaleData,
    #[serde(rename = "E-PATTERN")]
    PatternEvaluation,
    #[serde(rename = "E-BIAS-MISSING")]
    BiasMissing,
    #[serde(rename = "E-STORE-IO")]
    StoreIo,
    #[serde(rename = "E-CONFIG")]
    Config,
    #[serde(rename = "E-CSV-NOTFOUND")]
    CsvNotFound,
    #[serde(rename = "E-CSV-EMPTY")]
    CsvEmpty,
    #[serde(rename = "E-CSV-UNKNOWN")]
    CsvUnknown,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::FetchNetwork => "E-FETCH-NET",
            ErrorCode::SymbolNotFound => "E-YF-404",
            ErrorCode::FetchSource => "E-FETCH-SOURCE",
            ErrorCode::FetchCancelled => "E-FETCH-CANCELLED",
            ErrorCode::InsufficientHistory => "E-DATA-SHORT",
            ErrorCode::SentinelZeros => "E-DATA-ZERO",
            ErrorCode::StaleData => "E-DATA-STALE",
            ErrorCode::PatternEvaluation => "E-PATTERN",
            ErrorCode::BiasMissing => "E-BIAS-MISSING",
            ErrorCode::StoreIo => "E-STORE-IO",
            ErrorCode::Config => "E-CONFIG",
            ErrorCode::CsvNotFound => "E-CSV-NOTFOUND",
            ErrorCode::CsvEmpty => "E-CSV-EMPTY",
            ErrorCode::CsvUnknown => "E-CSV-UNKNOWN",
        }
    }

    /// Short description of what went wrong.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::FetchNetwork => "price data could not be downloaded",
            ErrorCode::SymbolNotFound => "no price data exists for this symbol",
            ErrorCode::FetchSource => "the price source refused the request",
            ErrorCode::FetchCancelled => "the batch was cancelled before this symbol was fetched",
            ErrorCode::InsufficientHistory => "not enough bars to evaluate candlestick patterns",
            ErrorCode::SentinelZeros => "the price source returned zero prices that were corrected",
            ErrorCode::StaleData => "scored on cached data after the refresh failed",
            ErrorCode::PatternEvaluation => "candlestick pattern evaluation failed",
            ErrorCode::BiasMissing => "a detected pattern has no bias weight",
            ErrorCode::StoreIo => "the price cache could not be read or written",
            ErrorCode::Config => "the configuration is invalid",
            ErrorCode::CsvNotFound => "the watchlist file was not found",
            ErrorCode::CsvEmpty => "the watchlist contains no usable symbols",
            ErrorCode::CsvUnknown => "the watchlist could not be read",
        }
    }

    /// What the user can do about it.
    pub fn guidance(self) -> &'static str {
        match self {
            ErrorCode::FetchNetwork => {
                "Check network connectivity and re-run with --retry-failed once the source responds."
            }
            ErrorCode::SymbolNotFound => {
                "Check the ticker spelling and include the market suffix (for example 7203.T)."
            }
            ErrorCode::FetchSource => {
                "The source may be rate limiting or has changed its response format. Wait for the cooldown and retry."
            }
            ErrorCode::FetchCancelled => "Run the batch again to resume the remaining symbols.",
            ErrorCode::InsufficientHistory => {
                "Increase fetch.lookback_days or wait until the symbol has a longer trading history."
            }
            ErrorCode::SentinelZeros => {
                "Inspect the affected bars; adjust fetch.sanitize.zero_policy if the correction is unsuitable."
            }
            ErrorCode::StaleData => {
                "The score reflects the last cached session. Retry the symbol to refresh it."
            }
            ErrorCode::PatternEvaluation => {
                "The cached bars contain invalid prices. Re-fetch the symbol with --force."
            }
            ErrorCode::BiasMissing => {
                "Add a row for the pattern to the bias table or disable the pattern."
            }
            ErrorCode::StoreIo => {
                "Check that the cache directory exists, is writable, and has free space."
            }
            ErrorCode::Config => "Fix the reported configuration value and run again.",
            ErrorCode::CsvNotFound => "Check the file path and permissions.",
            ErrorCode::CsvEmpty => {
                "Make sure the file has a ticker/symbol column with at least one value."
            }
            ErrorCode::CsvUnknown => "Save the watchlist as UTF-8 CSV and check its format.",
        }
    }

    /// Transient classes that "retry failed only" is designed to recover.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::FetchNetwork | ErrorCode::FetchSource | ErrorCode::FetchCancelled
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified error attached to one symbol's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolError {
    pub code: ErrorCode,
    pub symbol: String,
    pub detail: Option<String>,
}

impl SymbolError {
    pub fn new(code: ErrorCode, symbol: &str) -> Self {
        Self {
            code,
            symbol: symbol.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn guidance(&self) -> &'static str {
        self.code.guidance()
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.symbol, self.code, self.code.message())?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for SymbolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_symbol_code_and_detail() {
        let err = SymbolError::new(ErrorCode::SymbolNotFound, "XXXX").with_detail("HTTP 404");
        assert_eq!(
            err.to_string(),
            "XXXX: [E-YF-404] no price data exists for this symbol (HTTP 404)"
        );
    }

    #[test]
    fn serde_uses_stable_codes() {
        let json = serde_json::to_string(&ErrorCode::InsufficientHistory).unwrap();
        assert_eq!(json, "\"E-DATA-SHORT\"");
        let back: ErrorCode = serde_json::from_str("\"E-FETCH-NET\"").unwrap();
        assert_eq!(back, ErrorCode::FetchNetwork);
    }

    #[test]
    fn only_fetch_classes_are_retryable() {
        assert!(ErrorCode::FetchNetwork.is_retryable());
        assert!(!ErrorCode::SymbolNotFound.is_retryable());
        assert!(!ErrorCode::BiasMissing.is_retryable());
    }

    #[test]
    fn every_code_has_guidance() {
        for code in [
            ErrorCode::FetchNetwork,
            ErrorCode::SymbolNotFound,
            ErrorCode::FetchSource,
            ErrorCode::FetchCancelled,
            ErrorCode::InsufficientHistory,
            ErrorCode::SentinelZeros,
            ErrorCode::StaleData,
            ErrorCode::PatternEvaluation,
            ErrorCode::BiasMissing,
            ErrorCode::StoreIo,
            ErrorCode::Config,
            ErrorCode::CsvNotFound,
            ErrorCode::CsvEmpty,
            ErrorCode::CsvUnknown,
        ] {
            assert!(code.code().starts_with("E-"));
            assert!(!code.guidance().is_empty());
        }
    }
}
