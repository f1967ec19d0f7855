//! Per-ticker orchestration
//!
//! One ticker: spot → contract list → filter → one task per strategy →
//! report. The whole ticker runs under a deadline; when it expires the
//! in-flight gateway calls are dropped, unfinished strategy tasks are
//! aborted and the ticker fails as a unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, CachedGateway};
use crate::config::{EngineConfig, StrategyConfig};
use crate::error::{AnalysisError, GatewayError};
use crate::filter::filter_contracts;
use crate::gateway::MarketGateway;
use crate::limiter::RateLimitedGateway;
use crate::selector::evaluate_strategy;
use crate::types::AnalysisResult;

/// A ticker that produced no report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: String,
    pub message: String,
}

impl From<&AnalysisError> for TickerFailure {
    fn from(e: &AnalysisError) -> Self {
        Self {
            ticker: e.ticker().to_string(),
            error: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// One entry of a batch run, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TickerReport {
    Analyzed(AnalysisResult),
    Failed(TickerFailure),
}

impl TickerReport {
    pub fn ticker(&self) -> &str {
        match self {
            TickerReport::Analyzed(r) => &r.ticker,
            TickerReport::Failed(f) => &f.ticker,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, TickerReport::Analyzed(_))
    }
}

/// Debit call spread analyzer over an injected market gateway
#[derive(Clone)]
pub struct SpreadAnalyzer {
    gateway: Arc<dyn MarketGateway>,
    config: Arc<EngineConfig>,
}

impl SpreadAnalyzer {
    /// Use `gateway` as is
    pub fn new(gateway: Arc<dyn MarketGateway>, config: EngineConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
        }
    }

    /// Wrap a raw gateway in the rate limiter and, if given, a cache
    pub fn layered(
        raw: Arc<dyn MarketGateway>,
        cache: Option<Arc<dyn CacheStore>>,
        config: EngineConfig,
    ) -> Self {
        let limited: Arc<dyn MarketGateway> =
            Arc::new(RateLimitedGateway::new(raw, config.gateway.clone()));
        let gateway: Arc<dyn MarketGateway> = match cache {
            Some(store) => Arc::new(CachedGateway::new(limited, store, config.cache.clone())),
            None => limited,
        };
        Self::new(gateway, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[StrategyConfig] {
        &self.config.strategies
    }

    pub async fn analyze(&self, ticker: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_at(ticker, Utc::now()).await
    }

    /// Analyze one ticker as of `now`
    pub async fn analyze_at(
        &self,
        ticker: &str,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let ticker = ticker.trim().to_uppercase();
        let deadline = self.config.ticker_timeout();

        match tokio::time::timeout(deadline, self.run_ticker(&ticker, now)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(ticker = %ticker, timeout_ms = self.config.ticker_timeout_ms, "Ticker analysis timed out");
                Err(AnalysisError::Timeout {
                    ticker,
                    millis: self.config.ticker_timeout_ms,
                })
            }
        }
    }

    /// Analyze many tickers with bounded concurrency; one failure never
    /// affects the others
    pub async fn analyze_batch(&self, tickers: &[String]) -> Vec<TickerReport> {
        self.analyze_batch_at(tickers, Utc::now()).await
    }

    pub async fn analyze_batch_at(
        &self,
        tickers: &[String],
        now: DateTime<Utc>,
    ) -> Vec<TickerReport> {
        info!(tickers = tickers.len(), "Starting batch analysis");

        let reports: Vec<TickerReport> = stream::iter(tickers.iter().cloned())
            .map(|ticker| async move {
                match self.analyze_at(&ticker, now).await {
                    Ok(result) => TickerReport::Analyzed(result),
                    Err(e) => {
                        warn!(ticker = %e.ticker(), error = %e, "Ticker analysis failed");
                        TickerReport::Failed(TickerFailure::from(&e))
                    }
                }
            })
            .buffered(self.config.max_concurrent_tickers.max(1))
            .collect()
            .await;

        let analyzed = reports.iter().filter(|r| r.is_analyzed()).count();
        info!(
            analyzed,
            failed = reports.len() - analyzed,
            "Batch analysis complete"
        );
        reports
    }

    async fn run_ticker(
        &self,
        ticker: &str,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResult, AnalysisError> {
        // ── Spot ────────────────────────────────────────────────────────
        let spot = self
            .gateway
            .spot_price(ticker)
            .await
            .map_err(|e| AnalysisError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;
        if spot <= Decimal::ZERO {
            return Err(AnalysisError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: format!("non-positive price {}", spot),
            });
        }

        // ── Contracts ───────────────────────────────────────────────────
        let listings = match self.gateway.call_contracts(ticker).await {
            Ok(listings) => listings,
            Err(GatewayError::NotFound(_)) => Vec::new(),
            Err(source) => {
                return Err(AnalysisError::UpstreamApi {
                    ticker: ticker.to_string(),
                    source,
                })
            }
        };
        if listings.is_empty() {
            return Err(AnalysisError::NoContractsFound {
                ticker: ticker.to_string(),
            });
        }
        debug!(ticker, spot = %spot, listings = listings.len(), "Fetched contract chain");

        let (liquid, stats) =
            filter_contracts(self.gateway.as_ref(), listings, spot, &self.config, now).await;
        if liquid.is_empty() {
            return Err(AnalysisError::NoLiquidContracts {
                ticker: ticker.to_string(),
                listed: stats.listed,
                quoted: stats.quoted(),
            });
        }

        // ── Strategies ──────────────────────────────────────────────────
        // Evaluation is synchronous CPU work with no await points: aborting
        // the set cancels tasks not yet finished, but one already running
        // completes and its result is discarded.
        let liquid = Arc::new(liquid);
        let mut tasks = JoinSet::new();
        for strategy in &self.config.strategies {
            let liquid = Arc::clone(&liquid);
            let config = Arc::clone(&self.config);
            let strategy = strategy.clone();
            tasks.spawn(async move {
                let outcome = evaluate_strategy(&liquid, spot, &strategy, &config);
                (strategy.name, outcome)
            });
        }

        let mut strategies = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, outcome) = joined.map_err(|e| AnalysisError::StrategyTask {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;
            strategies.insert(name, outcome);
        }

        let result = AnalysisResult {
            ticker: ticker.to_string(),
            current_price: spot,
            timestamp: now,
            strategies,
        };
        info!(
            ticker,
            spot = %spot,
            liquid = liquid.len(),
            found = result.found_count(),
            "Ticker analyzed"
        );
        Ok(result)
    }
}
