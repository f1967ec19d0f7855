//! Engine configuration
//!
//! Canonical strategy bands (one set, used everywhere):
//!
//! | profile      | DTE    | ROI %    |
//! |--------------|--------|----------|
//! | aggressive   | 7–21   | 150–300  |
//! | balanced     | 22–40  | 75–150   |
//! | conservative | 41–60  | 25–75    |

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// DTE window and ROI target band for one risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub dte_min: u32,
    pub dte_max: u32,
    pub roi_min_percent: Decimal,
    pub roi_max_percent: Decimal,
}

impl StrategyConfig {
    pub fn new(
        name: impl Into<String>,
        dte_min: u32,
        dte_max: u32,
        roi_min_percent: Decimal,
        roi_max_percent: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            dte_min,
            dte_max,
            roi_min_percent,
            roi_max_percent,
        }
    }

    /// Short-dated, high payoff
    pub fn aggressive() -> Self {
        Self::new("aggressive", 7, 21, dec!(150), dec!(300))
    }

    pub fn balanced() -> Self {
        Self::new("balanced", 22, 40, dec!(75), dec!(150))
    }

    /// Longer-dated, modest payoff
    pub fn conservative() -> Self {
        Self::new("conservative", 41, 60, dec!(25), dec!(75))
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::aggressive(), Self::balanced(), Self::conservative()]
    }

    pub fn contains_dte(&self, dte: u32) -> bool {
        (self.dte_min..=self.dte_max).contains(&dte)
    }

    pub fn contains_roi(&self, roi_percent: Decimal) -> bool {
        roi_percent >= self.roi_min_percent && roi_percent <= self.roi_max_percent
    }
}

/// Pacing and retry policy around gateway calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayLimits {
    /// Maximum gateway calls in flight
    pub max_concurrent: usize,
    /// Minimum spacing between call starts
    pub min_interval_ms: u64,
    /// Retries after the first attempt (0 = no retry)
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Jitter as a fraction of the delay (0.1 = ±10%)
    pub jitter_factor: f64,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            min_interval_ms: 100,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            jitter_factor: 0.1,
        }
    }
}

impl GatewayLimits {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Longest accepted cache TTL for any operation
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Cache expiry per gateway operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub spot_secs: u64,
    pub contracts_secs: u64,
    pub quotes_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            spot_secs: 30,
            contracts_secs: 60,
            quotes_secs: 30,
        }
    }
}

/// Top-level configuration for a [`crate::SpreadAnalyzer`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategies: Vec<StrategyConfig>,
    /// Widest spread considered, in currency units
    pub max_width: Decimal,
    /// Strikes outside spot × (1 ± strike_band) are ignored
    pub strike_band: Decimal,
    /// Quotes with bid or ask at or below this are illiquid
    pub min_quote_price: Decimal,
    /// Slack added around the union of strategy DTE windows
    pub dte_margin_days: u32,
    /// Candidates valuated per strategy, taken in generator order
    pub max_candidates_per_strategy: usize,
    /// Concurrent quote fetches while filtering one ticker
    pub quote_concurrency: usize,
    pub ticker_timeout_ms: u64,
    pub max_concurrent_tickers: usize,
    pub gateway: GatewayLimits,
    pub cache: CacheTtls,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyConfig::defaults(),
            max_width: dec!(10),
            strike_band: dec!(0.15),
            min_quote_price: dec!(0.05),
            dte_margin_days: 5,
            max_candidates_per_strategy: 500,
            quote_concurrency: 4,
            ticker_timeout_ms: 45_000,
            max_concurrent_tickers: 2,
            gateway: GatewayLimits::default(),
            cache: CacheTtls::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.len() != 3 {
            return Err(ConfigError::Invalid(format!(
                "expected exactly 3 strategies, got {}",
                self.strategies.len()
            )));
        }

        let mut names = HashSet::new();
        for s in &self.strategies {
            if s.name.trim().is_empty() {
                return Err(ConfigError::Invalid("strategy name is empty".into()));
            }
            if !names.insert(s.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate strategy name '{}'",
                    s.name
                )));
            }
            if s.dte_min > s.dte_max {
                return Err(ConfigError::Invalid(format!(
                    "strategy '{}': dte_min {} > dte_max {}",
                    s.name, s.dte_min, s.dte_max
                )));
            }
            if s.roi_min_percent > s.roi_max_percent || s.roi_min_percent <= Decimal::ZERO {
                return Err(ConfigError::Invalid(format!(
                    "strategy '{}': ROI band {}..{} is not a positive range",
                    s.name, s.roi_min_percent, s.roi_max_percent
                )));
            }
        }

        if self.max_width <= Decimal::ZERO {
            return Err(ConfigError::Invalid("max_width must be positive".into()));
        }
        if self.strike_band <= Decimal::ZERO || self.strike_band >= Decimal::ONE {
            return Err(ConfigError::Invalid(
                "strike_band must be between 0 and 1".into(),
            ));
        }
        if self.min_quote_price < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "min_quote_price cannot be negative".into(),
            ));
        }
        if self.max_candidates_per_strategy == 0
            || self.quote_concurrency == 0
            || self.max_concurrent_tickers == 0
            || self.gateway.max_concurrent == 0
        {
            return Err(ConfigError::Invalid(
                "candidate cap and concurrency limits must be at least 1".into(),
            ));
        }
        if self.ticker_timeout_ms == 0 {
            return Err(ConfigError::Invalid("ticker_timeout_ms must be positive".into()));
        }

        let jitter = self.gateway.jitter_factor;
        if !jitter.is_finite() || !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigError::Invalid(format!(
                "gateway.jitter_factor {} must be between 0 and 1",
                jitter
            )));
        }
        if self.gateway.retry_base_delay_ms > self.gateway.retry_max_delay_ms {
            return Err(ConfigError::Invalid(
                "gateway.retry_base_delay_ms exceeds retry_max_delay_ms".into(),
            ));
        }
        for (field, secs) in [
            ("spot_secs", self.cache.spot_secs),
            ("contracts_secs", self.cache.contracts_secs),
            ("quotes_secs", self.cache.quotes_secs),
        ] {
            if secs > MAX_CACHE_TTL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "cache.{} {} exceeds {} seconds",
                    field, secs, MAX_CACHE_TTL_SECS
                )));
            }
        }

        Ok(())
    }

    /// DTE range worth quoting at all: every strategy window, widened by the margin
    pub fn feasibility_window(&self) -> (u32, u32) {
        let lo = self.strategies.iter().map(|s| s.dte_min).min().unwrap_or(0);
        let hi = self.strategies.iter().map(|s| s.dte_max).max().unwrap_or(0);
        (
            lo.saturating_sub(self.dte_margin_days),
            hi.saturating_add(self.dte_margin_days),
        )
    }

    pub fn ticker_timeout(&self) -> Duration {
        Duration::from_millis(self.ticker_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategies.len(), 3);
    }

    #[test]
    fn test_feasibility_window_covers_all_strategies() {
        let config = EngineConfig::default();
        let (lo, hi) = config.feasibility_window();
        assert_eq!((lo, hi), (2, 65));
        for s in &config.strategies {
            assert!(lo <= s.dte_min && s.dte_max <= hi);
        }
    }

    #[test]
    fn test_feasibility_window_floors_at_zero() {
        let config = EngineConfig {
            strategies: vec![
                StrategyConfig::new("a", 1, 5, dec!(100), dec!(200)),
                StrategyConfig::new("b", 6, 10, dec!(50), dec!(100)),
                StrategyConfig::new("c", 11, 20, dec!(10), dec!(50)),
            ],
            ..Default::default()
        };
        assert_eq!(config.feasibility_window(), (0, 25));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let config = EngineConfig {
            strategies: vec![
                StrategyConfig::aggressive(),
                StrategyConfig::aggressive(),
                StrategyConfig::conservative(),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bands() {
        let config = EngineConfig {
            strategies: vec![
                StrategyConfig::new("x", 30, 10, dec!(50), dec!(100)),
                StrategyConfig::balanced(),
                StrategyConfig::conservative(),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            strategies: vec![
                StrategyConfig::new("x", 10, 30, dec!(100), dec!(50)),
                StrategyConfig::balanced(),
                StrategyConfig::conservative(),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_three_strategies() {
        let config = EngineConfig {
            strategies: vec![StrategyConfig::aggressive()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_cache_ttls_and_jitter() {
        let huge_ttl = EngineConfig {
            cache: CacheTtls {
                quotes_secs: u64::MAX,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(huge_ttl.validate().is_err());

        let at_limit = EngineConfig {
            cache: CacheTtls {
                spot_secs: MAX_CACHE_TTL_SECS,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        for jitter in [-0.1, 1.5, f64::NAN] {
            let config = EngineConfig {
                gateway: GatewayLimits {
                    jitter_factor: jitter,
                    ..Default::default()
                },
                ..Default::default()
            };
            assert!(config.validate().is_err(), "jitter {} accepted", jitter);
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "max_width": "5", "gateway": { "max_retries": 0 } }"#)
                .unwrap();
        assert_eq!(config.max_width, dec!(5));
        assert_eq!(config.gateway.max_retries, 0);
        assert_eq!(config.gateway.max_concurrent, 4);
        assert_eq!(config.strategies, StrategyConfig::defaults());
    }

    #[test]
    fn test_band_membership_is_inclusive() {
        let s = StrategyConfig::aggressive();
        assert!(s.contains_dte(7) && s.contains_dte(21));
        assert!(!s.contains_dte(6) && !s.contains_dte(22));
        assert!(s.contains_roi(dec!(150)) && s.contains_roi(dec!(300)));
        assert!(!s.contains_roi(dec!(149.99)));
    }
}
