//! Candlescan Runner: configuration, fetch orchestration, and batch scanning.
//!
//! This crate builds on `candlescan-core` to provide:
//! - TOML scan configuration with validation
//! - Bounded-concurrency fetching with retry, backoff, and sentinel correction
//! - Metadata refresh with graceful degradation
//! - The batch coordinator with retry-failed-only and cancellation
//! - Watchlist CSV loading and JSON/CSV result export

pub mod batch;
pub mod config;
pub mod export;
pub mod fetch;
pub mod metadata;
pub mod retry;
pub mod watchlist;

pub use batch::{
    BatchCoordinator, BatchCounts, BatchError, BatchSummary, LogProgress, ProgressSink,
    ResultStatus, ScanOutcome, SymbolResult, SymbolState, TimelineDay,
};
pub use config::{
    AnalysisConfig, ConfigError, FetchConfig, MetadataConfig, RetryConfig, SanitizeConfig,
    ScanConfig,
};
pub use export::{export_csv, export_json, save_results, ExportFormat, SCHEMA_VERSION};
pub use fetch::{FetchJob, FetchObserver, FetchOrchestrator, FetchOutcome, FetchReport};
pub use metadata::refresh_metadata;
pub use retry::{sleep_cancellable, RetryPolicy};
pub use watchlist::{from_symbols, load_watchlist, parse_watchlist, WatchlistError};
