//! Strategy selection: best in-band ROI per risk profile

use rust_decimal::Decimal;
use tracing::debug;

use crate::candidates::{contracts_for_strategy, generate_candidates};
use crate::config::{EngineConfig, StrategyConfig};
use crate::error::StrategyFailure;
use crate::scenarios::project_scenarios;
use crate::types::{Contract, ContractPair, SpreadCandidate, SpreadValuation, StrategyOutcome};
use crate::valuation::valuate;

/// Furthest point one strategy evaluation reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    Unfiltered,
    ContractsFiltered,
    CandidatesGenerated,
    Valuated,
}

/// The winning candidate with its valuation
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub valuation: SpreadValuation,
    pub contracts: ContractPair,
}

/// Valuate `candidates` in order and keep the highest ROI inside the band.
///
/// Also returns how many candidates produced a valuation at all.
pub fn select_spread(
    candidates: &[SpreadCandidate<'_>],
    strategy: &StrategyConfig,
) -> (Option<Selection>, usize) {
    let mut best: Option<(Decimal, Selection)> = None;
    let mut valid = 0usize;

    for candidate in candidates {
        let Some(valuation) = valuate(candidate) else {
            continue;
        };
        valid += 1;

        if !strategy.contains_roi(valuation.roi_percent) {
            continue;
        }
        // strict: the first candidate at a given ROI keeps the slot
        let better = best
            .as_ref()
            .map_or(true, |(roi, _)| valuation.roi_percent > *roi);
        if better {
            best = Some((
                valuation.roi_percent,
                Selection {
                    contracts: ContractPair::from_candidate(candidate),
                    valuation,
                },
            ));
        }
    }

    (best.map(|(_, s)| s), valid)
}

/// Run one strategy end to end over the liquid contract set
pub fn evaluate_strategy(
    liquid: &[Contract],
    spot: Decimal,
    strategy: &StrategyConfig,
    config: &EngineConfig,
) -> StrategyOutcome {
    let mut stage = SelectionStage::Unfiltered;

    let eligible = contracts_for_strategy(liquid, strategy, spot, config.strike_band);
    stage = advance(stage, SelectionStage::ContractsFiltered, strategy);

    let no_candidates = || StrategyOutcome::NotFound {
        reason: StrategyFailure::NoCandidatesInStrategyBand {
            contracts: eligible.len(),
            dte_min: strategy.dte_min,
            dte_max: strategy.dte_max,
        },
    };

    if eligible.len() < 2 {
        debug!(strategy = %strategy.name, ?stage, contracts = eligible.len(), "Not enough contracts to pair");
        return no_candidates();
    }

    let candidates = generate_candidates(
        &eligible,
        config.max_width,
        config.max_candidates_per_strategy,
    );
    if candidates.is_empty() {
        debug!(strategy = %strategy.name, ?stage, contracts = eligible.len(), "No pairable spreads");
        return no_candidates();
    }
    stage = advance(stage, SelectionStage::CandidatesGenerated, strategy);

    let (selection, valid) = select_spread(&candidates, strategy);
    stage = advance(stage, SelectionStage::Valuated, strategy);

    match selection {
        Some(Selection { valuation, contracts }) => {
            debug!(
                strategy = %strategy.name,
                ?stage,
                long = %contracts.long_contract,
                short = %contracts.short_contract,
                roi = %valuation.roi_percent.round_dp(2),
                "Spread selected"
            );
            let scenarios = project_scenarios(&valuation, spot);
            StrategyOutcome::Found {
                valuation,
                contracts,
                scenarios,
            }
        }
        None => {
            debug!(strategy = %strategy.name, ?stage, evaluated = candidates.len(), valid, "No spread in ROI band");
            StrategyOutcome::NotFound {
                reason: StrategyFailure::NoSpreadInRoiBand {
                    evaluated: candidates.len(),
                    valid,
                    roi_min: strategy.roi_min_percent,
                    roi_max: strategy.roi_max_percent,
                },
            }
        }
    }
}

fn advance(from: SelectionStage, to: SelectionStage, strategy: &StrategyConfig) -> SelectionStage {
    debug!(strategy = %strategy.name, ?from, ?to, "Strategy stage");
    to
}
