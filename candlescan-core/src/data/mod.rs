//! Price data: remote sources, sanitization, the Price Store, and fetch planning.

pub mod circuit_breaker;
pub mod planner;
pub mod provider;
pub mod sanitize;
pub mod store;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use planner::{plan_for, plan_symbol, FetchPlan, PlannerOptions};
pub use provider::{
    DataError, DataSource, FetchResult, MetadataFields, MetadataSource, PriceSource, RawBar,
};
pub use sanitize::{sanitize, SanitizeReport, ZeroPricePolicy};
pub use store::{MemoryStore, ParquetStore, PriceStore, StoreError, StoreManifest, UpsertSummary};
pub use yahoo::YahooProvider;
