//! Contract filter: reduce a listed chain to liquid, in-window calls
//!
//! Only calls inside the DTE window and the strike band around spot are
//! quoted; everything else is dropped before any quote request.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::candidates::strike_band;
use crate::config::EngineConfig;
use crate::error::QUOTE_FETCH_ERROR;
use crate::gateway::MarketGateway;
use crate::types::{Contract, ContractListing, OptionType, Quote};

const SECONDS_PER_DAY: i64 = 86_400;

/// Counters for one filter pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub listed: usize,
    pub calls: usize,
    pub in_window: usize,
    pub in_band: usize,
    pub quote_failures: usize,
    pub illiquid: usize,
    pub liquid: usize,
}

impl FilterStats {
    /// Contracts that came back with a quote, liquid or not
    pub fn quoted(&self) -> usize {
        self.in_band - self.quote_failures
    }
}

/// Whole days until expiration, rounded up; expired contracts are 0
pub fn days_to_expiration(expiration: NaiveDate, now: DateTime<Utc>) -> u32 {
    let expiry = Utc.from_utc_datetime(&expiration.and_time(NaiveTime::MIN));
    let secs = (expiry - now).num_seconds();
    if secs <= 0 {
        return 0;
    }
    let days = (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Both sides must quote strictly above `min_price`
pub fn is_liquid(quote: &Quote, min_price: Decimal) -> bool {
    quote.bid > min_price && quote.ask > min_price
}

/// Keep calls whose DTE falls inside `window` and whose strike lies in
/// `strikes` (inclusive), paired with that DTE
pub fn calls_in_window(
    listings: Vec<ContractListing>,
    window: (u32, u32),
    strikes: (Decimal, Decimal),
    now: DateTime<Utc>,
    stats: &mut FilterStats,
) -> Vec<(ContractListing, u32)> {
    stats.listed = listings.len();

    let calls: Vec<ContractListing> = listings
        .into_iter()
        .filter(|l| l.option_type == OptionType::Call)
        .collect();
    stats.calls = calls.len();

    let (lo, hi) = window;
    let kept: Vec<(ContractListing, u32)> = calls
        .into_iter()
        .filter_map(|l| {
            let dte = days_to_expiration(l.expiration_date, now);
            (lo..=hi).contains(&dte).then_some((l, dte))
        })
        .collect();
    stats.in_window = kept.len();

    let (min_strike, max_strike) = strikes;
    let kept: Vec<(ContractListing, u32)> = kept
        .into_iter()
        .filter(|(l, _)| l.strike >= min_strike && l.strike <= max_strike)
        .collect();
    stats.in_band = kept.len();
    kept
}

/// Run the full filter for one underlying: type, DTE window, strike band,
/// quote, liquidity.
///
/// Quotes are fetched with bounded concurrency and come back in listing
/// order. A failed quote (`QuoteFetchError`) drops only that contract and is
/// counted in [`FilterStats::quote_failures`].
pub async fn filter_contracts(
    gateway: &dyn MarketGateway,
    listings: Vec<ContractListing>,
    spot: Decimal,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> (Vec<Contract>, FilterStats) {
    let mut stats = FilterStats::default();
    let window = config.feasibility_window();
    let strikes = strike_band(spot, config.strike_band);
    let candidates = calls_in_window(listings, window, strikes, now, &mut stats);

    let quoted: Vec<(ContractListing, u32, Option<Quote>)> = stream::iter(candidates)
        .map(|(listing, dte)| async move {
            match gateway.quote(&listing.symbol).await {
                Ok(quote) => (listing, dte, Some(quote)),
                Err(e) => {
                    debug!(
                        contract = %listing.symbol,
                        code = QUOTE_FETCH_ERROR,
                        error = %e,
                        "Quote fetch failed, dropping contract"
                    );
                    (listing, dte, None)
                }
            }
        })
        .buffered(config.quote_concurrency.max(1))
        .collect()
        .await;

    let mut liquid = Vec::with_capacity(quoted.len());
    for (listing, dte, quote) in quoted {
        match quote {
            None => stats.quote_failures += 1,
            Some(q) if !is_liquid(&q, config.min_quote_price) => stats.illiquid += 1,
            Some(q) => liquid.push(Contract::from_listing(listing, dte, q)),
        }
    }
    stats.liquid = liquid.len();

    info!(
        listed = stats.listed,
        calls = stats.calls,
        in_window = stats.in_window,
        in_band = stats.in_band,
        quote_failures = stats.quote_failures,
        illiquid = stats.illiquid,
        liquid = stats.liquid,
        window_lo = window.0,
        window_hi = window.1,
        "Contract filter complete"
    );

    (liquid, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 7, 15, 30, 0).unwrap()
    }

    fn listing(symbol: &str, option_type: OptionType, strike: Decimal, days_out: i64) -> ContractListing {
        ContractListing {
            symbol: symbol.to_string(),
            option_type,
            strike,
            expiration_date: (now() + Duration::days(days_out)).date_naive(),
        }
    }

    struct QuoteBook {
        quotes: HashMap<String, Quote>,
    }

    #[async_trait]
    impl MarketGateway for QuoteBook {
        async fn spot_price(&self, _s: &str) -> Result<Decimal, GatewayError> {
            Ok(dec!(100))
        }

        async fn call_contracts(&self, _u: &str) -> Result<Vec<ContractListing>, GatewayError> {
            Ok(Vec::new())
        }

        async fn quote(&self, contract_symbol: &str) -> Result<Quote, GatewayError> {
            self.quotes
                .get(contract_symbol)
                .copied()
                .ok_or_else(|| GatewayError::NotFound(contract_symbol.to_string()))
        }
    }

    #[test]
    fn test_days_to_expiration_rounds_up() {
        // 2024-06-07 15:30 → 2024-06-08 00:00 is 8.5 hours
        let tomorrow = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        assert_eq!(days_to_expiration(tomorrow, now()), 1);

        let in_two_weeks = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        assert_eq!(days_to_expiration(in_two_weeks, now()), 14);
    }

    #[test]
    fn test_days_to_expiration_clamps_past_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let last_week = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(days_to_expiration(today, now()), 0);
        assert_eq!(days_to_expiration(last_week, now()), 0);
    }

    #[test]
    fn test_liquidity_threshold_is_strict() {
        let min = dec!(0.05);
        assert!(is_liquid(&Quote { bid: dec!(0.06), ask: dec!(0.10) }, min));
        assert!(!is_liquid(&Quote { bid: dec!(0.05), ask: dec!(0.10) }, min));
        assert!(!is_liquid(&Quote { bid: dec!(0.20), ask: dec!(0.05) }, min));
        assert!(!is_liquid(&Quote { bid: Decimal::ZERO, ask: Decimal::ZERO }, min));
    }

    #[test]
    fn test_calls_in_window_drops_puts_and_out_of_window() {
        let listings = vec![
            listing("C10", OptionType::Call, dec!(100), 10),
            listing("P10", OptionType::Put, dec!(100), 10),
            listing("C1", OptionType::Call, dec!(100), 1),
            listing("C90", OptionType::Call, dec!(100), 90),
            listing("C65", OptionType::Call, dec!(100), 65),
        ];
        let mut stats = FilterStats::default();
        let kept = calls_in_window(listings, (2, 65), (dec!(85), dec!(115)), now(), &mut stats);

        let symbols: Vec<&str> = kept.iter().map(|(l, _)| l.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["C10", "C65"]);
        assert_eq!(stats.listed, 5);
        assert_eq!(stats.calls, 4);
        assert_eq!(stats.in_window, 2);
        assert_eq!(stats.in_band, 2);
    }

    #[test]
    fn test_calls_in_window_drops_strikes_outside_band() {
        let listings = vec![
            listing("LOW", OptionType::Call, dec!(84.99), 10),
            listing("EDGE_LO", OptionType::Call, dec!(85), 10),
            listing("ATM", OptionType::Call, dec!(100), 10),
            listing("EDGE_HI", OptionType::Call, dec!(115), 10),
            listing("HIGH", OptionType::Call, dec!(115.01), 10),
        ];
        let mut stats = FilterStats::default();
        let kept = calls_in_window(listings, (2, 65), strike_band(dec!(100), dec!(0.15)), now(), &mut stats);

        let symbols: Vec<&str> = kept.iter().map(|(l, _)| l.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EDGE_LO", "ATM", "EDGE_HI"]);
        assert_eq!(stats.in_window, 5);
        assert_eq!(stats.in_band, 3);
    }

    #[tokio::test]
    async fn test_filter_drops_failed_and_illiquid_quotes() {
        let listings = vec![
            listing("GOOD1", OptionType::Call, dec!(100), 14),
            listing("NOQUOTE", OptionType::Call, dec!(101), 14),
            listing("THIN", OptionType::Call, dec!(102), 14),
            listing("GOOD2", OptionType::Call, dec!(103), 30),
        ];
        let mut quotes = HashMap::new();
        quotes.insert("GOOD1".to_string(), Quote { bid: dec!(2.10), ask: dec!(2.20) });
        quotes.insert("THIN".to_string(), Quote { bid: dec!(0.05), ask: dec!(0.15) });
        quotes.insert("GOOD2".to_string(), Quote { bid: dec!(1.00), ask: dec!(1.10) });
        let gateway = QuoteBook { quotes };

        let (contracts, stats) =
            filter_contracts(&gateway, listings, dec!(100), &EngineConfig::default(), now()).await;

        let symbols: Vec<&str> = contracts.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["GOOD1", "GOOD2"]);
        assert_eq!(contracts[0].dte, 14);
        assert_eq!(contracts[0].bid, dec!(2.10));
        assert_eq!(stats.quote_failures, 1);
        assert_eq!(stats.illiquid, 1);
        assert_eq!(stats.liquid, 2);
        assert_eq!(stats.quoted(), 3);
    }

    #[tokio::test]
    async fn test_filter_never_quotes_out_of_band_strikes() {
        let listings = vec![
            listing("FAR_OTM", OptionType::Call, dec!(150), 14),
            listing("NEAR", OptionType::Call, dec!(102), 14),
        ];
        let mut quotes = HashMap::new();
        // FAR_OTM would be liquid if it were ever quoted
        quotes.insert("FAR_OTM".to_string(), Quote { bid: dec!(1.00), ask: dec!(1.10) });
        quotes.insert("NEAR".to_string(), Quote { bid: dec!(2.00), ask: dec!(2.10) });
        let gateway = QuoteBook { quotes };

        let (contracts, stats) =
            filter_contracts(&gateway, listings, dec!(100), &EngineConfig::default(), now()).await;

        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].symbol, "NEAR");
        assert_eq!(stats.in_window, 2);
        assert_eq!(stats.in_band, 1);
        assert_eq!(stats.quoted(), 1);
    }
}
