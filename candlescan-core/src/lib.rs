//! Candlescan Core: price store, fetch planning, candlestick recognizers, scoring.
//!
//! This crate holds everything that does not need a worker pool:
//! - Domain types (bars, price series, symbol metadata)
//! - The durable per-symbol Price Store and the freshness planner
//! - Remote price/metadata sources and sentinel-zero sanitizing
//! - 61 TA-Lib-compatible candlestick recognizers evaluated on the final bar
//! - Bias-weighted scoring with clipping and an ordered breakdown
//! - Stable error codes with user guidance

pub mod data;
pub mod domain;
pub mod error;
pub mod patterns;
pub mod scoring;
