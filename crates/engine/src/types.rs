//! Types for the spread engine

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StrategyFailure;

/// Option right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

/// Contract metadata as listed by the gateway, before quoting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractListing {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiration_date: NaiveDate,
}

/// Top-of-book quote for one contract
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// A quoted contract that survived filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiration_date: NaiveDate,
    pub dte: u32,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Contract {
    pub fn from_listing(listing: ContractListing, dte: u32, quote: Quote) -> Self {
        Self {
            symbol: listing.symbol,
            option_type: listing.option_type,
            strike: listing.strike,
            expiration_date: listing.expiration_date,
            dte,
            bid: quote.bid,
            ask: quote.ask,
        }
    }
}

/// Long the lower strike, short the higher strike, same expiration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadCandidate<'a> {
    pub long: &'a Contract,
    pub short: &'a Contract,
}

impl<'a> SpreadCandidate<'a> {
    /// Returns `None` unless `long.strike < short.strike` and expirations match
    pub fn new(long: &'a Contract, short: &'a Contract) -> Option<Self> {
        if long.strike < short.strike && long.expiration_date == short.expiration_date {
            Some(Self { long, short })
        } else {
            None
        }
    }

    pub fn width(&self) -> Decimal {
        self.short.strike - self.long.strike
    }
}

/// Expiration-value economics of one debit call spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadValuation {
    pub long_strike: Decimal,
    pub short_strike: Decimal,
    pub width: Decimal,
    pub cost: Decimal,
    pub max_profit: Decimal,
    pub max_loss: Decimal,
    pub breakeven: Decimal,
    pub roi_percent: Decimal,
    pub dte: u32,
    pub expiration_date: NaiveDate,
}

/// Contract legs of a selected spread, with the prices used to cost it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractPair {
    pub long_contract: String,
    pub short_contract: String,
    /// Ask paid for the long leg
    pub long_price: Decimal,
    /// Bid received for the short leg
    pub short_price: Decimal,
}

impl ContractPair {
    pub fn from_candidate(candidate: &SpreadCandidate<'_>) -> Self {
        Self {
            long_contract: candidate.long.symbol.clone(),
            short_contract: candidate.short.symbol.clone(),
            long_price: candidate.long.ask,
            short_price: candidate.short.bid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Profit,
    Loss,
}

/// Spread P/L at expiration for one hypothetical underlying move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPoint {
    pub price_change_percent: Decimal,
    pub future_price: Decimal,
    pub spread_value_at_expiration: Decimal,
    pub profit_loss: Decimal,
    pub roi_percent: Decimal,
    pub outcome: Outcome,
}

/// Result of one strategy profile for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "crate::report::StrategyReport")]
pub enum StrategyOutcome {
    Found {
        valuation: SpreadValuation,
        contracts: ContractPair,
        scenarios: Vec<ScenarioPoint>,
    },
    NotFound {
        reason: StrategyFailure,
    },
}

impl StrategyOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, StrategyOutcome::Found { .. })
    }

    pub fn valuation(&self) -> Option<&SpreadValuation> {
        match self {
            StrategyOutcome::Found { valuation, .. } => Some(valuation),
            StrategyOutcome::NotFound { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&StrategyFailure> {
        match self {
            StrategyOutcome::Found { .. } => None,
            StrategyOutcome::NotFound { reason } => Some(reason),
        }
    }
}

/// Full report for one ticker, keyed by strategy name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub ticker: String,
    #[serde(rename = "current_stock_price")]
    pub current_price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub strategies: BTreeMap<String, StrategyOutcome>,
}

impl AnalysisResult {
    pub fn found_count(&self) -> usize {
        self.strategies.values().filter(|o| o.is_found()).count()
    }
}
