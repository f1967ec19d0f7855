//! Polygon.io REST client for spot prices, option chains and quotes

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::gateway::MarketGateway;
use crate::types::{ContractListing, OptionType, Quote};

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
/// Listings kept per underlying across all pages
const MAX_CONTRACTS: usize = 1000;
const PRICE_DP: u32 = 4;

/// Polygon market data client
#[derive(Clone)]
pub struct PolygonClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Previous-day aggregate response
#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggBar>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    /// Close
    c: f64,
}

/// One page of the options reference listing
#[derive(Debug, Deserialize)]
struct ContractsPage {
    #[serde(default)]
    results: Vec<RawContract>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContract {
    ticker: String,
    contract_type: String,
    strike_price: f64,
    expiration_date: String,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    results: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(default)]
    bid_price: f64,
    #[serde(default)]
    ask_price: f64,
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, GatewayError> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(PRICE_DP))
        .map_err(|e| GatewayError::Decode(format!("{}: {}", field, e)))
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Previous close from an aggregates body
pub fn parse_spot(symbol: &str, body: &str) -> Result<Decimal, GatewayError> {
    let resp: AggsResponse = decode(body)?;
    let bar = resp
        .results
        .first()
        .ok_or_else(|| GatewayError::NotFound(symbol.to_string()))?;
    to_decimal(bar.c, "close")
}

/// Listings and the next page cursor from a reference body. Unknown rights
/// and rows with an unreadable date or strike are skipped; only a body that
/// fails to decode as a whole is an error
pub fn parse_contracts_page(
    body: &str,
) -> Result<(Vec<ContractListing>, Option<String>), GatewayError> {
    let page: ContractsPage = decode(body)?;
    let mut listings = Vec::with_capacity(page.results.len());

    for raw in page.results {
        let option_type = match raw.contract_type.as_str() {
            "call" => OptionType::Call,
            "put" => OptionType::Put,
            _ => continue,
        };
        let expiration_date = match NaiveDate::parse_from_str(&raw.expiration_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                debug!(
                    contract = %raw.ticker,
                    expiration_date = %raw.expiration_date,
                    error = %e,
                    "Skipping listing with bad expiration"
                );
                continue;
            }
        };
        let strike = match to_decimal(raw.strike_price, "strike_price") {
            Ok(strike) => strike,
            Err(e) => {
                debug!(contract = %raw.ticker, error = %e, "Skipping listing with bad strike");
                continue;
            }
        };
        listings.push(ContractListing {
            symbol: raw.ticker,
            option_type,
            strike,
            expiration_date,
        });
    }

    Ok((listings, page.next_url))
}

/// Latest bid/ask from a quotes body
pub fn parse_quote(contract_symbol: &str, body: &str) -> Result<Quote, GatewayError> {
    let resp: QuotesResponse = decode(body)?;
    let raw = resp
        .results
        .first()
        .ok_or_else(|| GatewayError::NotFound(contract_symbol.to_string()))?;
    Ok(Quote {
        bid: to_decimal(raw.bid_price, "bid_price")?,
        ask: to_decimal(raw.ask_price, "ask_price")?,
    })
}

impl PolygonClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host (proxies, test servers)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// GET `url` with the API key attached; non-2xx becomes `Status`
    async fn fetch(&self, url: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketGateway for PolygonClient {
    async fn spot_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let url = format!("{}/v2/aggs/ticker/{}/prev", self.base_url, symbol);
        debug!(symbol, "Fetching previous close from Polygon");
        let body = self.fetch(&url).await?;
        parse_spot(symbol, &body)
    }

    async fn call_contracts(&self, underlying: &str) -> Result<Vec<ContractListing>, GatewayError> {
        let mut url = format!(
            "{}/v3/reference/options/contracts?underlying_ticker={}&contract_type=call&expired=false&limit=1000",
            self.base_url, underlying
        );
        let mut listings = Vec::new();
        let mut pages = 0u32;

        loop {
            let body = self.fetch(&url).await?;
            let (page, next) = parse_contracts_page(&body)?;
            pages += 1;
            listings.extend(page);

            match next {
                Some(next_url) if listings.len() < MAX_CONTRACTS => url = next_url,
                _ => break,
            }
        }
        listings.truncate(MAX_CONTRACTS);

        info!(underlying, contracts = listings.len(), pages, "Fetched option contracts from Polygon");
        Ok(listings)
    }

    async fn quote(&self, contract_symbol: &str) -> Result<Quote, GatewayError> {
        let url = format!(
            "{}/v3/quotes/{}?limit=1&order=desc&sort=timestamp",
            self.base_url, contract_symbol
        );
        let body = self.fetch(&url).await?;
        parse_quote(contract_symbol, &body)
    }
}
