//! Spread Scanner Engine: debit call spread search over option chains
//!
//! Provides:
//! - Contract filtering by right, expiration window and liquidity
//! - Candidate generation, valuation and per-strategy selection
//! - Expiration P/L scenarios for the selected spread
//! - `MarketGateway` boundary with rate-limit, cache and Polygon.io layers

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod candidates;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod limiter;
pub mod report;
pub mod scenarios;
pub mod selector;
pub mod types;
pub mod valuation;

// Re-exports for convenience
pub use analyzer::{SpreadAnalyzer, TickerFailure, TickerReport};
pub use api::PolygonClient;
pub use cache::{cache_key, CacheStore, CachedGateway, MemoryCache, SqliteCache};
pub use config::{CacheTtls, EngineConfig, GatewayLimits, StrategyConfig};
pub use error::{
    AnalysisError, CacheError, ConfigError, GatewayError, StrategyFailure, QUOTE_FETCH_ERROR,
};
pub use filter::{filter_contracts, FilterStats};
pub use gateway::MarketGateway;
pub use limiter::RateLimitedGateway;
pub use report::{PriceScenario, SpreadDetails, StrategyReport};
pub use scenarios::{project_scenarios, scenario_percentages};
pub use selector::{evaluate_strategy, select_spread, Selection};
pub use types::*;
pub use valuation::valuate;
