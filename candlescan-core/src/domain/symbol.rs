//! Symbol identity: normalization, market inference, and cached metadata.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market a ticker trades on, inferred from its Yahoo-style suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Us,
    Jp,
    Ca,
    Uk,
}

impl Market {
    pub fn code(self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Jp => "JP",
            Market::Ca => "CA",
            Market::Uk => "UK",
        }
    }

    /// Exchange timezone used when the price source does not report one.
    pub fn default_timezone(self) -> &'static str {
        match self {
            Market::Us => "America/New_York",
            Market::Jp => "Asia/Tokyo",
            Market::Ca => "America/Toronto",
            Market::Uk => "Europe/London",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "US" => Some(Market::Us),
            "JP" => Some(Market::Jp),
            "CA" => Some(Market::Ca),
            "UK" => Some(Market::Uk),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

const SUFFIX_RULES: [(&str, Market); 3] = [(".T", Market::Jp), (".TO", Market::Ca), (".L", Market::Uk)];

/// Infer the market from a ticker suffix (`.T` Tokyo, `.TO` Toronto, `.L` London).
/// Anything else is treated as US.
pub fn infer_market(symbol: &str) -> Market {
    let cleaned = symbol.trim().to_ascii_uppercase();
    SUFFIX_RULES
        .iter()
        .find(|(suffix, _)| cleaned.ends_with(suffix))
        .map(|(_, market)| *market)
        .unwrap_or(Market::Us)
}

/// Normalize a user-supplied ticker.
///
/// Trims whitespace, appends `.T` to all-digit Tokyo codes, and upper-cases
/// everything else. Punctuation such as `.` and `-` is preserved.
pub fn normalize_symbol(symbol: &str) -> String {
    let cleaned = symbol.trim();
    if cleaned.is_empty() {
        return String::new();
    }
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return format!("{cleaned}.T");
    }
    cleaned.to_uppercase()
}

/// One watchlist entry as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sector: String,
    pub market: Option<Market>,
}

impl SymbolRecord {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            name: String::new(),
            sector: String::new(),
            market: None,
        }
    }
}

/// Cached identity for a symbol. Keyed uniquely by `symbol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub market: Market,
    pub last_updated: NaiveDateTime,
}

impl SymbolMetadata {
    /// Metadata carrying only what can be derived from the ticker itself.
    pub fn inferred(symbol: &str, now: NaiveDateTime) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: None,
            sector: None,
            market: infer_market(symbol),
            last_updated: now,
        }
    }

    /// True when the entry is older than `max_age_days` relative to `now`.
    pub fn is_stale(&self, now: NaiveDateTime, max_age_days: i64) -> bool {
        now - self.last_updated > chrono::Duration::days(max_age_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn infers_market_from_suffix() {
        assert_eq!(infer_market("7203.T"), Market::Jp);
        assert_eq!(infer_market("shop.to"), Market::Ca);
        assert_eq!(infer_market("VOD.L"), Market::Uk);
        assert_eq!(infer_market("AAPL"), Market::Us);
        assert_eq!(infer_market("BRK-B"), Market::Us);
    }

    #[test]
    fn normalizes_symbols() {
        assert_eq!(normalize_symbol("  aapl "), "AAPL");
        assert_eq!(normalize_symbol("7203"), "7203.T");
        assert_eq!(normalize_symbol("brk-b"), "BRK-B");
        assert_eq!(normalize_symbol("   "), "");
    }

    #[test]
    fn market_code_roundtrip() {
        for m in [Market::Us, Market::Jp, Market::Ca, Market::Uk] {
            assert_eq!(Market::parse(m.code()), Some(m));
        }
        assert_eq!(Market::parse("xx"), None);
    }

    #[test]
    fn metadata_staleness() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let meta = SymbolMetadata::inferred("AAPL", at);
        assert!(!meta.is_stale(at + chrono::Duration::days(10), 30));
        assert!(meta.is_stale(at + chrono::Duration::days(31), 30));
    }
}
