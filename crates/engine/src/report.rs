//! Wire shape of a strategy outcome
//!
//! `StrategyOutcome` serializes through [`StrategyReport`]: a `found` flag with
//! optional detail blocks, every amount rounded to cents.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::types::{ContractPair, Outcome, ScenarioPoint, SpreadValuation, StrategyOutcome};

const REPORT_DP: u32 = 2;

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORT_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadDetails {
    pub long_strike: Decimal,
    pub short_strike: Decimal,
    pub spread_width: Decimal,
    pub spread_cost: Decimal,
    pub max_profit: Decimal,
    pub max_loss: Decimal,
    pub breakeven_price: Decimal,
    pub roi_percent: Decimal,
    pub days_to_expiration: u32,
    pub expiration_date: NaiveDate,
}

impl From<&SpreadValuation> for SpreadDetails {
    fn from(v: &SpreadValuation) -> Self {
        Self {
            long_strike: v.long_strike,
            short_strike: v.short_strike,
            spread_width: v.width,
            spread_cost: cents(v.cost),
            max_profit: cents(v.max_profit),
            max_loss: cents(v.max_loss),
            breakeven_price: cents(v.breakeven),
            roi_percent: cents(v.roi_percent),
            days_to_expiration: v.dte,
            expiration_date: v.expiration_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceScenario {
    pub price_change_percent: Decimal,
    pub future_stock_price: Decimal,
    pub spread_value_at_expiration: Decimal,
    pub profit_loss: Decimal,
    pub roi_percent: Decimal,
    pub outcome: Outcome,
}

impl From<&ScenarioPoint> for PriceScenario {
    fn from(p: &ScenarioPoint) -> Self {
        Self {
            price_change_percent: p.price_change_percent,
            future_stock_price: cents(p.future_price),
            spread_value_at_expiration: cents(p.spread_value_at_expiration),
            profit_loss: cents(p.profit_loss),
            roi_percent: cents(p.roi_percent),
            outcome: p.outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_details: Option<SpreadDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contracts: Option<ContractPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_scenarios: Option<Vec<PriceScenario>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<&'static str>,
}

impl From<StrategyOutcome> for StrategyReport {
    fn from(outcome: StrategyOutcome) -> Self {
        match outcome {
            StrategyOutcome::Found {
                valuation,
                contracts,
                scenarios,
            } => Self {
                found: true,
                spread_details: Some(SpreadDetails::from(&valuation)),
                contracts: Some(contracts),
                price_scenarios: Some(scenarios.iter().map(PriceScenario::from).collect()),
                reason: None,
                reason_code: None,
            },
            StrategyOutcome::NotFound { reason } => Self {
                found: false,
                spread_details: None,
                contracts: None,
                price_scenarios: None,
                reason_code: Some(reason.code()),
                reason: Some(reason.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyFailure;
    use rust_decimal_macros::dec;

    fn found_outcome() -> StrategyOutcome {
        StrategyOutcome::Found {
            valuation: SpreadValuation {
                long_strike: dec!(133.50),
                short_strike: dec!(134.50),
                width: dec!(1.00),
                cost: dec!(0.39),
                max_profit: dec!(0.61),
                max_loss: dec!(0.39),
                breakeven: dec!(133.89),
                roi_percent: dec!(0.61) / dec!(0.39) * dec!(100),
                dte: 14,
                expiration_date: NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
            },
            contracts: ContractPair {
                long_contract: "O:XYZ240621C00133500".into(),
                short_contract: "O:XYZ240621C00134500".into(),
                long_price: dec!(1.50),
                short_price: dec!(1.11),
            },
            scenarios: vec![ScenarioPoint {
                price_change_percent: dec!(-2.5),
                future_price: dec!(136.08075),
                spread_value_at_expiration: dec!(1.00000),
                profit_loss: dec!(0.61000),
                roi_percent: dec!(0.61) / dec!(0.39) * dec!(100),
                outcome: Outcome::Profit,
            }],
        }
    }

    #[test]
    fn test_found_report_shape() {
        let json = serde_json::to_value(found_outcome()).unwrap();

        assert_eq!(json["found"], true);
        assert_eq!(json["spread_details"]["roi_percent"], "156.41");
        assert_eq!(json["spread_details"]["spread_width"], "1.00");
        assert_eq!(json["spread_details"]["expiration_date"], "2024-06-21");
        assert_eq!(json["contracts"]["long_price"], "1.50");
        assert_eq!(json["price_scenarios"][0]["future_stock_price"], "136.08");
        assert_eq!(json["price_scenarios"][0]["outcome"], "profit");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_not_found_report_shape() {
        let outcome = StrategyOutcome::NotFound {
            reason: StrategyFailure::NoCandidatesInStrategyBand {
                contracts: 1,
                dte_min: 7,
                dte_max: 21,
            },
        };
        let json = serde_json::to_value(outcome).unwrap();

        assert_eq!(json["found"], false);
        assert_eq!(json["reason_code"], "NoCandidatesInStrategyBand");
        assert!(json["reason"].as_str().unwrap().contains("7-21"));
        assert!(json.get("spread_details").is_none());
        assert!(json.get("price_scenarios").is_none());
    }
}
