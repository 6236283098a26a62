//! Domain types for candlescan

pub mod bar;
pub mod symbol;

pub use bar::{Bar, PriceSeries};
pub use symbol::{infer_market, normalize_symbol, Market, SymbolMetadata, SymbolRecord};

/// Symbol type alias
pub type Symbol = String;
