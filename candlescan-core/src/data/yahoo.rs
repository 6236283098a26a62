//! Yahoo Finance price and metadata source.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Each call is a single
//! attempt guarded by the circuit breaker; retry and backoff live in the fetch
//! orchestrator so every source gets the same policy.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. Shape drift is surfaced as `ResponseFormatChanged`, which is never
//! retried.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DataSource, FetchResult, MetadataFields, MetadataSource, PriceSource, RawBar,
};
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Parsed chart payload: bars plus the meta block.
struct ParsedChart {
    bars: Vec<RawBar>,
    timezone: Option<String>,
    name: Option<String>,
}

/// What a request is for. Only price requests count toward the breaker's
/// failure threshold; metadata lookups are best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Prices,
    Metadata,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::default()).and_utc().timestamp();
        // period2 is exclusive: include the whole end day.
        let end_ts = (end + chrono::Duration::days(1))
            .and_time(chrono::NaiveTime::default())
            .and_utc()
            .timestamp();
        format!("{BASE_URL}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d")
    }

    fn meta_url(symbol: &str) -> String {
        format!("{BASE_URL}/{symbol}?range=5d&interval=1d")
    }

    /// Parse the chart API response.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<ParsedChart, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (_, Some(err)) if err.code == "Not Found" => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (_, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (Some(result), None) => result,
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let meta = data.meta.unwrap_or_default();
        let tz: Option<Tz> = meta
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse().ok());

        // No timestamps: the range held no sessions.
        let Some(timestamps) = data.timestamp else {
            return Ok(ParsedChart {
                bars: Vec::new(),
                timezone: meta.exchange_timezone_name,
                name: meta.long_name.or(meta.short_name),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let instant = Utc
                .timestamp_opt(ts, 0)
                .single()
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            // Session date in the exchange's local calendar.
            let date = match tz {
                Some(tz) => instant.with_timezone(&tz).date_naive(),
                None => instant.date_naive(),
            };

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Skip rows where every field is null (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        Ok(ParsedChart {
            bars,
            timezone: meta.exchange_timezone_name,
            name: meta.long_name.or(meta.short_name),
        })
    }

    fn record_failure(&self, symbol: &str, kind: RequestKind) {
        if kind == RequestKind::Prices {
            self.circuit_breaker.record_failure(symbol);
        }
    }

    /// Execute a single HTTP request under the circuit breaker.
    fn request(&self, symbol: &str, url: &str, kind: RequestKind) -> Result<ParsedChart, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        debug!(symbol, url, ?kind, "requesting chart");
        let resp = self.client.get(url).send().map_err(|e| {
            self.record_failure(symbol, kind);
            if e.is_timeout() {
                DataError::Timeout(e.to_string())
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            // IP ban: trip immediately
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.record_failure(symbol, kind);
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if status.is_server_error() {
            self.record_failure(symbol, kind);
            return Err(DataError::ServerError {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(DataError::ClientError {
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let parsed = Self::parse_response(symbol, chart)?;
        self.circuit_breaker.record_success();
        Ok(parsed)
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let parsed = self.request(symbol, &Self::chart_url(symbol, start, end), RequestKind::Prices)?;
        // Yahoo may return sessions just outside the requested window.
        let bars = parsed
            .bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            timezone: parsed.timezone,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl MetadataSource for YahooProvider {
    /// The chart meta block carries the display name and exchange timezone.
    /// Sector is not exposed by the chart API.
    fn fetch_metadata(&self, symbol: &str) -> Result<MetadataFields, DataError> {
        let parsed = self.request(symbol, &Self::meta_url(symbol), RequestKind::Metadata)?;
        Ok(MetadataFields {
            name: parsed.name,
            sector: None,
            timezone: parsed.timezone,
        })
    }
}
