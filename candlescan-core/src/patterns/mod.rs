//! Candlestick pattern recognition.
//!
//! 61 TA-Lib-compatible recognizers, each a pure function of the bar slice
//! and an index, returning 0 for no match or a signed multiple of 100.

pub mod candle;
pub mod double;
pub mod engine;
pub mod multi;
pub mod registry;
pub mod single;
pub mod triple;

pub use candle::{Candles, Setting};
pub use engine::{HitDay, PatternEngine, PatternError, PatternHit};
pub use registry::{PatternId, Recognizer, RECOGNIZERS};
