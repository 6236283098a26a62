//! Scan configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are validated once after loading; CLI flags are
//! applied on top by the caller before validation.

use candlescan_core::data::{PlannerOptions, ZeroPricePolicy};
use candlescan_core::error::ErrorCode;
use candlescan_core::patterns::registry;
use candlescan_core::scoring::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound for concurrent fetches.
pub const MAX_CONCURRENCY: usize = 32;

/// Upper bound for day-count settings (about a century).
pub const MAX_DAYS: i64 = 36_500;

/// Upper bound for `fetch.retry.max_retries`.
pub const MAX_RETRIES: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::Config
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete configuration for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub fetch: FetchConfig,
    pub scoring: ScoringConfig,
    pub analysis: AnalysisConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// History window in calendar days.
    pub lookback_days: i64,
    /// Concurrent fetches; clamped to `1..=32`.
    pub max_concurrency: usize,
    /// Weekday sessions the cache may lag before a refresh is planned.
    pub freshness_tolerance_sessions: u32,
    /// Score on cached bars when the refresh fails.
    pub use_stale_on_failure: bool,
    pub force_refresh: bool,
    /// Never contact the price source; score whatever is cached.
    pub offline: bool,
    pub http_timeout_secs: u64,
    pub retry: RetryConfig,
    pub sanitize: SanitizeConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            max_concurrency: 5,
            freshness_tolerance_sessions: 0,
            use_stale_on_failure: false,
            force_refresh: false,
            offline: false,
            http_timeout_secs: 30,
            retry: RetryConfig::default(),
            sanitize: SanitizeConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, MAX_CONCURRENCY)
    }

    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            lookback_days: self.lookback_days,
            freshness_tolerance_sessions: self.freshness_tolerance_sessions,
            force_refresh: self.force_refresh,
        }
    }
}

/// Backoff for transient fetch failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Randomize each delay by ±25%.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            multiplier: 1.6,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    pub zero_policy: ZeroPricePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// TA-Lib function names; `None` enables all 61 recognizers.
    pub enabled_patterns: Option<Vec<String>>,
    /// Bars of hit timeline to report per symbol; 0 disables it.
    pub history_lookback: usize,
    /// Alternative bias table CSV; the built-in table is used when unset.
    pub bias_table: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub refresh_after_days: i64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_after_days: 30,
        }
    }
}

impl ScanConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if !(1..=MAX_DAYS).contains(&fetch.lookback_days) {
            return Err(ConfigError::invalid(
                "fetch.lookback_days",
                format!("{} is outside 1..={MAX_DAYS}", fetch.lookback_days),
            ));
        }
        if i64::from(fetch.freshness_tolerance_sessions) > MAX_DAYS {
            return Err(ConfigError::invalid(
                "fetch.freshness_tolerance_sessions",
                format!("{} exceeds {MAX_DAYS}", fetch.freshness_tolerance_sessions),
            ));
        }
        if fetch.http_timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch.http_timeout_secs", "must be positive"));
        }

        let retry = &fetch.retry;
        if retry.max_retries > MAX_RETRIES {
            return Err(ConfigError::invalid(
                "fetch.retry.max_retries",
                format!("{} exceeds {MAX_RETRIES}", retry.max_retries),
            ));
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "fetch.retry.multiplier",
                format!("{} is not a finite value >= 1.0", retry.multiplier),
            ));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "fetch.retry.base_delay_ms",
                format!("{} exceeds max_delay_ms {}", retry.base_delay_ms, retry.max_delay_ms),
            ));
        }

        let scoring = &self.scoring;
        if scoring.clip_min >= scoring.clip_max {
            return Err(ConfigError::invalid(
                "scoring.clip_min",
                format!("{} must be below clip_max {}", scoring.clip_min, scoring.clip_max),
            ));
        }
        if scoring.highlight_pos <= 0 || scoring.highlight_neg >= 0 {
            return Err(ConfigError::invalid(
                "scoring.highlight_pos",
                "highlight_pos must be positive and highlight_neg negative",
            ));
        }

        if let Some(names) = &self.analysis.enabled_patterns {
            if names.is_empty() {
                return Err(ConfigError::invalid("analysis.enabled_patterns", "list is empty"));
            }
            if let Some(unknown) = names.iter().find(|n| registry::find(n).is_none()) {
                return Err(ConfigError::invalid(
                    "analysis.enabled_patterns",
                    format!("unknown pattern '{unknown}'"),
                ));
            }
        }

        if !(0..=MAX_DAYS).contains(&self.metadata.refresh_after_days) {
            return Err(ConfigError::invalid(
                "metadata.refresh_after_days",
                format!("{} is outside 0..={MAX_DAYS}", self.metadata.refresh_after_days),
            ));
        }
        Ok(())
    }
}
