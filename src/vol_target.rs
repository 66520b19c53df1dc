//! Portfolio-level volatility targeting.
//!
//! Scales a scalar return stream so its trailing realized volatility tracks
//! a fixed target. The scaling factor computed from history through period
//! t is applied to period t+1's return, so no period is scaled by its own
//! realized volatility.

use crate::error::Result;
use crate::frame::{Series, MONTHS_PER_YEAR};
use serde::{Deserialize, Serialize};

fn default_target_vol() -> f64 {
    0.10
}

fn default_lookback() -> usize {
    12
}

fn default_max_leverage() -> f64 {
    2.0
}

/// Configuration for volatility targeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolTargetConfig {
    /// Annualized volatility target.
    #[serde(default = "default_target_vol")]
    pub target_vol: f64,
    /// Trailing window for realized volatility.
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Leverage cap on the scaling factor.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: f64,
}

impl Default for VolTargetConfig {
    fn default() -> Self {
        Self {
            target_vol: default_target_vol(),
            lookback: default_lookback(),
            max_leverage: default_max_leverage(),
        }
    }
}

/// Volatility targeting engine.
#[derive(Debug, Clone, Default)]
pub struct VolTargetEngine {
    config: VolTargetConfig,
}

impl VolTargetEngine {
    pub fn new(config: VolTargetConfig) -> Self {
        Self { config }
    }

    /// Scale a portfolio return series toward the volatility target.
    ///
    /// Realized volatility is the rolling sample standard deviation over the
    /// lookback, annualized. Each period's return is multiplied by the
    /// previous period's scaling factor, capped at the leverage limit.
    /// Periods with insufficient history become zero returns.
    pub fn apply_vol_targeting(&self, portfolio_returns: &Series) -> Result<Series> {
        let realized = portfolio_returns
            .rolling_std(self.config.lookback)
            .map_values(|v| v * MONTHS_PER_YEAR.sqrt());

        // Zero realized volatility sends the raw factor to infinity; the
        // leverage cap is what keeps it finite.
        let scaling = realized
            .map_values(|rv| (self.config.target_vol / rv).min(self.config.max_leverage))
            .shift(1);

        let adjusted = portfolio_returns.zip_with(&scaling, |ret, scale| match (ret, scale) {
            (Some(r), Some(s)) => Some(r * s),
            _ => None,
        })?;

        Ok(adjusted.fill_none(0.0))
    }
}
