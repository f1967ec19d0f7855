//! Expiration P/L projection over a fixed set of underlying moves

use rust_decimal::Decimal;

use crate::types::{Outcome, ScenarioPoint, SpreadValuation};

/// Underlying moves, in tenths of a percent: −10% … +10% in 2.5% steps
const SCENARIO_TENTHS: [i64; 9] = [-100, -75, -50, -25, 0, 25, 50, 75, 100];

/// The canonical 9-point scenario set, in percent
pub fn scenario_percentages() -> [Decimal; 9] {
    SCENARIO_TENTHS.map(|tenths| Decimal::new(tenths, 1))
}

/// Intrinsic value of a call at expiration
fn intrinsic(price: Decimal, strike: Decimal) -> Decimal {
    (price - strike).max(Decimal::ZERO)
}

/// Project `valuation` across every scenario, in set order
pub fn project_scenarios(valuation: &SpreadValuation, spot: Decimal) -> Vec<ScenarioPoint> {
    let hundred = Decimal::ONE_HUNDRED;

    scenario_percentages()
        .into_iter()
        .map(|pct| {
            let future_price = spot * (Decimal::ONE + pct / hundred);
            let spread_value = intrinsic(future_price, valuation.long_strike)
                - intrinsic(future_price, valuation.short_strike);
            let profit_loss = spread_value - valuation.cost;
            let roi_percent = profit_loss / valuation.cost * hundred;

            ScenarioPoint {
                price_change_percent: pct,
                future_price,
                spread_value_at_expiration: spread_value,
                profit_loss,
                roi_percent,
                outcome: if profit_loss > Decimal::ZERO {
                    Outcome::Profit
                } else {
                    Outcome::Loss
                },
            }
        })
        .collect()
}
