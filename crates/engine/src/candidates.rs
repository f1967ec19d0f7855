//! Spread candidate generation per strategy

use rust_decimal::Decimal;

use crate::config::StrategyConfig;
use crate::types::{Contract, SpreadCandidate};

/// Inclusive strike range around spot: `spot × (1 ± band)`
pub fn strike_band(spot: Decimal, band: Decimal) -> (Decimal, Decimal) {
    (spot * (Decimal::ONE - band), spot * (Decimal::ONE + band))
}

/// Liquid contracts inside the strategy's DTE window and the strike band,
/// sorted by strike ascending
pub fn contracts_for_strategy<'a>(
    liquid: &'a [Contract],
    strategy: &StrategyConfig,
    spot: Decimal,
    band: Decimal,
) -> Vec<&'a Contract> {
    let (lo, hi) = strike_band(spot, band);
    let mut eligible: Vec<&Contract> = liquid
        .iter()
        .filter(|c| strategy.contains_dte(c.dte))
        .filter(|c| c.strike >= lo && c.strike <= hi)
        .collect();
    eligible.sort_by(|a, b| {
        a.strike
            .cmp(&b.strike)
            .then_with(|| a.expiration_date.cmp(&b.expiration_date))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    eligible
}

/// Every same-expiration pair with width at most `max_width`, tightest and
/// lowest first, truncated to `cap`
pub fn generate_candidates<'a>(
    eligible: &[&'a Contract],
    max_width: Decimal,
    cap: usize,
) -> Vec<SpreadCandidate<'a>> {
    let mut candidates = Vec::new();

    for (i, &long) in eligible.iter().enumerate() {
        for &short in &eligible[i + 1..] {
            let Some(candidate) = SpreadCandidate::new(long, short) else {
                continue;
            };
            if candidate.width() <= max_width {
                candidates.push(candidate);
            }
        }
    }

    candidates.sort_by(|a, b| {
        a.width()
            .cmp(&b.width())
            .then_with(|| a.long.strike.cmp(&b.long.strike))
            .then_with(|| a.long.expiration_date.cmp(&b.long.expiration_date))
            .then_with(|| a.short.strike.cmp(&b.short.strike))
            .then_with(|| a.long.symbol.cmp(&b.long.symbol))
            .then_with(|| a.short.symbol.cmp(&b.short.symbol))
    });
    candidates.truncate(cap);
    candidates
}
