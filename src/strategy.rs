//! Single-asset strategy layers over a regime label series.
//!
//! The rotation engine is the primary consumer of regime labels, but the
//! labels also drive two simpler overlays: a regime-to-exposure mapping over
//! a precomputed benchmark return column, and a binary time-series momentum
//! signal. Both are pure transforms of already-classified data.

use crate::error::{BacktestError, Result};
use crate::frame::{Frame, Series};
use crate::regime::{Regime, RegimeSeries};
use serde::{Deserialize, Serialize};

fn default_risk_on_exposure() -> f64 {
    1.2
}

fn default_neutral_exposure() -> f64 {
    1.0
}

fn default_risk_off_exposure() -> f64 {
    0.0
}

fn default_benchmark_column() -> String {
    "NIFTY_RET".to_string()
}

/// Exposure multipliers per regime bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Exposure while either risk-on regime is in effect.
    #[serde(default = "default_risk_on_exposure")]
    pub risk_on: f64,
    /// Exposure in the defensive regime.
    #[serde(default = "default_neutral_exposure")]
    pub neutral: f64,
    /// Exposure in the strong risk-off regime.
    #[serde(default = "default_risk_off_exposure")]
    pub risk_off: f64,
    /// Benchmark return column the exposure is applied to.
    #[serde(default = "default_benchmark_column")]
    pub benchmark_column: String,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            risk_on: default_risk_on_exposure(),
            neutral: default_neutral_exposure(),
            risk_off: default_risk_off_exposure(),
            benchmark_column: default_benchmark_column(),
        }
    }
}

impl ExposureConfig {
    /// Exposure for a label; unlabeled dates carry zero exposure.
    pub fn exposure(&self, regime: Option<Regime>) -> f64 {
        match regime {
            Some(Regime::StrongRiskOn) | Some(Regime::ModerateRiskOn) => self.risk_on,
            Some(Regime::Defensive) => self.neutral,
            Some(Regime::StrongRiskOff) => self.risk_off,
            None => 0.0,
        }
    }
}

/// Output of a regime-exposure strategy run.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    /// Exposure multiplier per labeled date.
    pub exposures: Series,
    /// Exposure-scaled benchmark returns.
    pub strategy_returns: Series,
    /// Cumulative growth of one unit of capital.
    pub equity_curve: Series,
}

/// Converts regime labels into benchmark exposure and a strategy return
/// series with its equity curve.
#[derive(Debug, Clone, Default)]
pub struct StrategyEngine {
    config: ExposureConfig,
}

impl StrategyEngine {
    pub fn new(config: ExposureConfig) -> Self {
        Self { config }
    }

    /// Apply the exposure map to the benchmark returns on the label dates.
    ///
    /// The table must carry the configured benchmark return column; dates
    /// present in `regimes` but absent from the table contribute zero
    /// return.
    pub fn run(&self, table: &Frame, regimes: &RegimeSeries) -> Result<StrategyResult> {
        table.require_columns(&[&self.config.benchmark_column])?;
        let benchmark = table.column(&self.config.benchmark_column)?;

        let mut dates = Vec::with_capacity(regimes.len());
        let mut exposures = Vec::with_capacity(regimes.len());
        let mut returns = Vec::with_capacity(regimes.len());
        for (date, regime) in regimes.iter() {
            let exposure = self.config.exposure(Some(regime));
            let ret = benchmark.at(date).flatten().unwrap_or(0.0);
            dates.push(date);
            exposures.push(Some(exposure));
            returns.push(Some(exposure * ret));
        }

        let exposures = Series::new(dates.clone(), exposures)?;
        let strategy_returns = Series::new(dates, returns)?;
        let equity_curve = strategy_returns.cum_growth();

        Ok(StrategyResult {
            exposures,
            strategy_returns,
            equity_curve,
        })
    }
}

/// Binary time-series momentum signal: 1 where the trailing `lookback`
/// return is positive, 0 otherwise. Dates without a full lookback are
/// dropped.
pub fn trend_signal(prices: &Series, lookback: usize) -> Result<Series> {
    if lookback == 0 {
        return Err(BacktestError::ConfigError(
            "trend lookback must be positive".to_string(),
        ));
    }
    let momentum = prices.pct_change(lookback);
    Ok(momentum
        .map_values(|m| if m > 0.0 { 1.0 } else { 0.0 })
        .dropna())
}
