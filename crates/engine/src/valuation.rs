//! Expiration-value economics of a debit call spread

use rust_decimal::Decimal;

use crate::types::{SpreadCandidate, SpreadValuation};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Value one candidate: pay the long ask, receive the short bid.
///
/// Returns `None` for spreads that cost nothing, cannot profit, or break the
/// candidate invariant.
pub fn valuate(candidate: &SpreadCandidate<'_>) -> Option<SpreadValuation> {
    let long = candidate.long;
    let short = candidate.short;
    if long.strike >= short.strike || long.expiration_date != short.expiration_date {
        return None;
    }

    let cost = long.ask - short.bid;
    if cost <= Decimal::ZERO {
        return None;
    }

    let width = short.strike - long.strike;
    let max_profit = width - cost;
    if max_profit <= Decimal::ZERO {
        return None;
    }

    let roi_percent = max_profit.checked_div(cost)? * HUNDRED;
    if roi_percent <= Decimal::ZERO {
        return None;
    }

    Some(SpreadValuation {
        long_strike: long.strike,
        short_strike: short.strike,
        width,
        cost,
        max_profit,
        max_loss: cost,
        breakeven: long.strike + cost,
        roi_percent,
        dte: long.dte,
        expiration_date: long.expiration_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Contract, OptionType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn call(symbol: &str, strike: Decimal, bid: Decimal, ask: Decimal) -> Contract {
        Contract {
            symbol: symbol.to_string(),
            option_type: OptionType::Call,
            strike,
            expiration_date: NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
            dte: 14,
            bid,
            ask,
        }
    }

    #[test]
    fn test_golden_valuation() {
        let long = call("L", dec!(133.50), dec!(1.40), dec!(1.50));
        let short = call("S", dec!(134.50), dec!(1.11), dec!(1.20));
        let v = valuate(&SpreadCandidate::new(&long, &short).unwrap()).unwrap();

        assert_eq!(v.cost, dec!(0.39));
        assert_eq!(v.max_profit, dec!(0.61));
        assert_eq!(v.max_loss, dec!(0.39));
        assert_eq!(v.breakeven, dec!(133.89));
        assert_eq!(v.width, dec!(1.00));
        assert_eq!(v.roi_percent.round_dp(2), dec!(156.41));
        assert_eq!(v.dte, 14);
    }

    #[test]
    fn test_valuation_identities_hold() {
        let pairs = [
            (dec!(100), dec!(3.10), dec!(105), dec!(1.05)),
            (dec!(97.5), dec!(4.00), dec!(100), dec!(2.35)),
            (dec!(140), dec!(0.90), dec!(150), dec!(0.12)),
        ];
        for (ls, ask, ss, bid) in pairs {
            let long = call("L", ls, ask - dec!(0.05), ask);
            let short = call("S", ss, bid, bid + dec!(0.05));
            let v = valuate(&SpreadCandidate::new(&long, &short).unwrap()).unwrap();

            assert!(v.long_strike < v.short_strike);
            assert_eq!(v.max_profit + v.cost, v.width);
            assert_eq!(v.breakeven, v.long_strike + v.cost);
            assert_eq!(v.roi_percent, v.max_profit / v.cost * dec!(100));
        }
    }

    #[test]
    fn test_rejects_credit_or_free_spreads() {
        let long = call("L", dec!(100), dec!(0.90), dec!(1.00));
        let short = call("S", dec!(101), dec!(1.00), dec!(1.10));
        assert!(valuate(&SpreadCandidate::new(&long, &short).unwrap()).is_none());

        let short = call("S", dec!(101), dec!(1.20), dec!(1.30));
        assert!(valuate(&SpreadCandidate::new(&long, &short).unwrap()).is_none());
    }

    #[test]
    fn test_rejects_cost_at_or_above_width() {
        let long = call("L", dec!(100), dec!(2.90), dec!(3.00));
        let short = call("S", dec!(102), dec!(1.00), dec!(1.10));
        // cost 2.00 == width 2
        assert!(valuate(&SpreadCandidate::new(&long, &short).unwrap()).is_none());

        let short = call("S", dec!(102), dec!(0.50), dec!(0.60));
        assert!(valuate(&SpreadCandidate::new(&long, &short).unwrap()).is_none());
    }

    #[test]
    fn test_rejects_invariant_violations() {
        let long = call("L", dec!(105), dec!(1.00), dec!(1.10));
        let short = call("S", dec!(100), dec!(3.00), dec!(3.10));
        let inverted = SpreadCandidate {
            long: &long,
            short: &short,
        };
        assert!(valuate(&inverted).is_none());

        let long = call("L", dec!(100), dec!(3.00), dec!(3.10));
        let mut short = call("S", dec!(105), dec!(1.00), dec!(1.10));
        short.expiration_date = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
        let mixed = SpreadCandidate {
            long: &long,
            short: &short,
        };
        assert!(valuate(&mixed).is_none());
    }
}
