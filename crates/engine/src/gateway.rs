//! Quote/contract gateway boundary
//!
//! Every market-data source (REST client, cache layer, rate limiter, test
//! fake) implements [`MarketGateway`]; layers wrap an `Arc<dyn MarketGateway>`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::GatewayError;
use crate::types::{ContractListing, Quote};

#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Latest spot price of the underlying
    async fn spot_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    /// Call contracts listed on the underlying (may include other rights)
    async fn call_contracts(&self, underlying: &str) -> Result<Vec<ContractListing>, GatewayError>;

    /// Top-of-book quote for one contract
    async fn quote(&self, contract_symbol: &str) -> Result<Quote, GatewayError>;
}
