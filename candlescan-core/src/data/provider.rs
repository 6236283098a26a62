//! Price/metadata source traits and structured error types.
//!
//! The PriceSource trait abstracts over remote data sources (Yahoo Finance,
//! scripted fakes in tests) so the fetch orchestrator never depends on a
//! concrete HTTP client.

use crate::error::ErrorCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar from a price source (before sanitization).
///
/// Missing fields arrive as NaN; zero prices are possible and are treated as
/// sentinel-invalid downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl RawBar {
    /// True if any OHLC field is zero, negative, or not finite.
    pub fn has_sentinel(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
    }
}

/// Structured error types for source and cache operations.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("request rejected: HTTP {status}")]
    ClientError { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,
}

impl DataError {
    /// Transient failures are worth retrying with backoff; everything else is
    /// permanent for this batch.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::Timeout(_)
                | DataError::RateLimited { .. }
                | DataError::ServerError { .. }
        )
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            DataError::NetworkUnreachable(_)
            | DataError::Timeout(_)
            | DataError::RateLimited { .. }
            | DataError::ServerError { .. } => ErrorCode::FetchNetwork,
            DataError::SymbolNotFound { .. } => ErrorCode::SymbolNotFound,
            DataError::ClientError { status: 404 } => ErrorCode::SymbolNotFound,
            DataError::ClientError { .. }
            | DataError::ResponseFormatChanged(_)
            | DataError::AuthenticationRequired(_)
            | DataError::CircuitBreakerTripped => ErrorCode::FetchSource,
        }
    }
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    /// Exchange timezone reported by the source, if any.
    pub timezone: Option<String>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    Cache,
    Synthetic,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::YahooFinance => "yahoo_finance",
            DataSource::Cache => "cache",
            DataSource::Synthetic => "synthetic",
        }
    }
}

/// Remote source of daily bars.
///
/// Implementations make exactly one attempt per call; retry and backoff
/// belong to the fetch orchestrator.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a symbol over an inclusive date range.
    ///
    /// An empty `bars` vector means the source had nothing in the range.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Descriptive fields a metadata source may know about a symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFields {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub timezone: Option<String>,
}

/// Optional source of display name / sector. Absence is tolerated.
pub trait MetadataSource: Send + Sync {
    fn fetch_metadata(&self, symbol: &str) -> Result<MetadataFields, DataError>;
}
