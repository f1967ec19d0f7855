//! Error taxonomy for the spread engine
//!
//! Three scopes: a single gateway call ([`GatewayError`]), a single strategy
//! ([`StrategyFailure`], surfaced as `found: false`), and a whole ticker
//! ([`AnalysisError`], aborts that ticker only).
//!
//! A failed per-contract quote is not an error value at all: the filter logs
//! it under [`QUOTE_FETCH_ERROR`], counts it and drops the contract.

use rust_decimal::Decimal;
use thiserror::Error;

/// Code logged when a single contract quote fails during filtering
pub const QUOTE_FETCH_ERROR: &str = "QuoteFetchError";

/// Failure of one call against the quote/contract gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream payload: {0}")]
    Decode(String),

    #[error("No data returned for {0}")]
    NotFound(String),

    #[error("Gateway limiter closed")]
    Closed,
}

impl GatewayError {
    /// Rate limits, server errors and transport hiccups are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GatewayError::Status { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Decode(_) | GatewayError::NotFound(_) | GatewayError::Closed => false,
        }
    }
}

/// Why a single strategy produced no spread
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyFailure {
    #[error(
        "NoCandidatesInStrategyBand: {contracts} contract(s) within DTE {dte_min}-{dte_max} \
         and the strike band, none pairable"
    )]
    NoCandidatesInStrategyBand {
        contracts: usize,
        dte_min: u32,
        dte_max: u32,
    },

    #[error(
        "NoSpreadInROIBand: none of {evaluated} candidate(s) ({valid} with positive value) \
         returned between {roi_min}% and {roi_max}%"
    )]
    NoSpreadInRoiBand {
        evaluated: usize,
        valid: usize,
        roi_min: Decimal,
        roi_max: Decimal,
    },
}

impl StrategyFailure {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            StrategyFailure::NoCandidatesInStrategyBand { .. } => "NoCandidatesInStrategyBand",
            StrategyFailure::NoSpreadInRoiBand { .. } => "NoSpreadInROIBand",
        }
    }
}

/// Ticker-level failure; the ticker produces no report
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Price unavailable for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("No option contracts found for {ticker}")]
    NoContractsFound { ticker: String },

    #[error("No liquid call contracts for {ticker} ({listed} listed, {quoted} quoted)")]
    NoLiquidContracts {
        ticker: String,
        listed: usize,
        quoted: usize,
    },

    #[error("Upstream API error for {ticker}: {source}")]
    UpstreamApi {
        ticker: String,
        #[source]
        source: GatewayError,
    },

    #[error("Analysis of {ticker} timed out after {millis}ms")]
    Timeout { ticker: String, millis: u64 },

    #[error("Strategy task for {ticker} failed: {reason}")]
    StrategyTask { ticker: String, reason: String },
}

impl AnalysisError {
    pub fn ticker(&self) -> &str {
        match self {
            AnalysisError::PriceUnavailable { ticker, .. }
            | AnalysisError::NoContractsFound { ticker }
            | AnalysisError::NoLiquidContracts { ticker, .. }
            | AnalysisError::UpstreamApi { ticker, .. }
            | AnalysisError::Timeout { ticker, .. }
            | AnalysisError::StrategyTask { ticker, .. } => ticker,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::PriceUnavailable { .. } => "PriceUnavailable",
            AnalysisError::NoContractsFound { .. } => "NoContractsFound",
            AnalysisError::NoLiquidContracts { .. } => "NoLiquidContracts",
            AnalysisError::UpstreamApi { .. } => "UpstreamAPIError",
            AnalysisError::Timeout { .. } => "Timeout",
            AnalysisError::StrategyTask { .. } => "StrategyTask",
        }
    }
}

/// Cache store failure; callers treat it as a miss
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Db(#[from] persistence::DbError),

    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
