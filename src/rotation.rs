//! Multi-asset rotation backtest engine.
//!
//! Composes monthly asset prices, a liquidity regime series, and trailing
//! momentum ranking into a weight matrix, then hands the weights to the risk
//! budget engine and the resulting portfolio returns to the volatility
//! targeting engine. One `backtest` call runs the full staged pipeline:
//!
//! 1. month-end resampling of asset prices (strict cross-asset alignment)
//! 2. regime fit/predict over the supplied table, collapsed to month ends
//! 3. trailing N-month momentum per asset
//! 4. regime-conditioned weight generation, shifted one period against
//!    lookahead, then inverse-volatility rescaled
//! 5. gross/net returns and turnover
//! 6. volatility targeting and the equity curve
//!
//! Nothing persists between calls; every invocation rebuilds its state from
//! the frame it was constructed over.

use crate::error::{BacktestError, Result};
use crate::frame::{intersect_dates, Frame, Series};
use crate::regime::{Regime, RegimeConfig, RegimeEngine};
use crate::risk::RiskEngine;
use crate::vol_target::{VolTargetConfig, VolTargetEngine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_assets() -> Vec<String> {
    vec!["NIFTY".to_string(), "SPY".to_string(), "GLD".to_string()]
}

fn default_hedge_asset() -> String {
    "GLD".to_string()
}

fn default_momentum_lookback() -> usize {
    12
}

fn default_transaction_cost() -> f64 {
    0.001
}

fn default_vol_lookback() -> usize {
    12
}

/// Configuration for the rotation strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Price columns traded by the rotation, hedge included.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
    /// The defensive asset receiving the non-equity share.
    #[serde(default = "default_hedge_asset")]
    pub hedge_asset: String,
    /// Trailing window for cross-sectional momentum, in months.
    #[serde(default = "default_momentum_lookback")]
    pub momentum_lookback: usize,
    /// Cost per unit of turnover.
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost: f64,
    /// Trailing window for the risk budget's volatility estimate.
    #[serde(default = "default_vol_lookback")]
    pub vol_lookback: usize,
    /// Portfolio-level volatility targeting.
    #[serde(default)]
    pub vol_target: VolTargetConfig,
    /// Liquidity regime classification.
    #[serde(default)]
    pub regime: RegimeConfig,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            hedge_asset: default_hedge_asset(),
            momentum_lookback: default_momentum_lookback(),
            transaction_cost: default_transaction_cost(),
            vol_lookback: default_vol_lookback(),
            vol_target: VolTargetConfig::default(),
            regime: RegimeConfig::default(),
        }
    }
}

impl RotationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(BacktestError::ConfigError(
                "rotation needs at least one asset".to_string(),
            ));
        }
        if !self.assets.contains(&self.hedge_asset) {
            return Err(BacktestError::ConfigError(format!(
                "hedge asset {} is not among the rotation assets",
                self.hedge_asset
            )));
        }
        if self.momentum_lookback == 0 {
            return Err(BacktestError::ConfigError(
                "momentum lookback must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Regime-conditioned equity/hedge split. The top-ranked equity asset gets
/// the equity share; unlabeled months behave like strong risk-off and go
/// fully to the hedge.
fn allocation(regime: Option<Regime>) -> (f64, f64) {
    match regime {
        Some(Regime::StrongRiskOn) => (0.80, 0.20),
        Some(Regime::ModerateRiskOn) => (0.60, 0.40),
        Some(Regime::Defensive) => (0.30, 0.70),
        Some(Regime::StrongRiskOff) | None => (0.0, 1.0),
    }
}

/// Everything a rotation backtest produces.
#[derive(Debug, Clone, Serialize)]
pub struct RotationResult {
    /// Month-end asset prices after strict alignment.
    pub monthly_prices: Frame,
    /// Month-over-month asset returns.
    pub monthly_returns: Frame,
    /// Regime label in effect at each month end.
    pub regime_monthly: Vec<(NaiveDate, Option<Regime>)>,
    /// Trailing momentum per asset.
    pub momentum: Frame,
    /// Final weight matrix after shifting and risk budgeting.
    pub weights: Frame,
    /// Sum of absolute weight changes per month.
    pub turnover: Series,
    /// Net, volatility-targeted portfolio returns.
    pub portfolio_returns: Series,
    /// Cumulative growth of one unit of capital.
    pub equity_curve: Series,
}

/// Regime- and momentum-driven rotation engine over one price/macro table.
pub struct MultiAssetRotationEngine {
    frame: Frame,
    config: RotationConfig,
}

impl MultiAssetRotationEngine {
    pub fn new(frame: Frame, config: RotationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { frame, config })
    }

    /// Run the full pipeline and return the staged outputs.
    ///
    /// Regime fit failures (empty or degenerate liquidity composite)
    /// propagate: the whole backtest call fails rather than recovering
    /// locally.
    pub fn backtest(&self) -> Result<RotationResult> {
        let monthly_prices = self
            .frame
            .select(&self.config.assets)?
            .resample_month_end_last()
            .dropna_rows();
        let monthly_returns = monthly_prices.pct_change(1).dropna_rows();

        let regime_monthly = self.build_regime()?;
        let momentum = monthly_prices.pct_change(self.config.momentum_lookback);

        let weights = self.generate_weights(&monthly_returns, &momentum, &regime_monthly)?;

        let aligned_returns = monthly_returns.reindex(weights.dates());
        let n_assets = self.config.assets.len();
        let mut gross = Vec::with_capacity(weights.len());
        let mut turnover = Vec::with_capacity(weights.len());
        for row in 0..weights.len() {
            let mut ret = 0.0;
            for col in 0..n_assets {
                if let (Some(w), Some(r)) = (weights.get(row, col), aligned_returns.get(row, col))
                {
                    ret += w * r;
                }
            }
            gross.push(Some(ret));

            let t = if row == 0 {
                0.0
            } else {
                (0..n_assets)
                    .map(|col| {
                        let cur = weights.get(row, col).unwrap_or(0.0);
                        let prev = weights.get(row - 1, col).unwrap_or(0.0);
                        (cur - prev).abs()
                    })
                    .sum()
            };
            turnover.push(Some(t));
        }
        let gross = Series::new(weights.dates().to_vec(), gross)?;
        let turnover = Series::new(weights.dates().to_vec(), turnover)?;

        let cost = self.config.transaction_cost;
        let net = gross.zip_with(&turnover, |g, t| match (g, t) {
            (Some(g), Some(t)) => Some(g - t * cost),
            _ => None,
        })?;

        let portfolio_returns =
            VolTargetEngine::new(self.config.vol_target).apply_vol_targeting(&net)?;
        let equity_curve = portfolio_returns.cum_growth();

        debug!(
            months = weights.len(),
            assets = n_assets,
            "rotation backtest complete"
        );

        Ok(RotationResult {
            monthly_prices,
            monthly_returns,
            regime_monthly,
            momentum,
            weights,
            turnover,
            portfolio_returns,
            equity_curve,
        })
    }

    /// Fit and classify the liquidity regime over the engine's entire frame,
    /// collapsed to the label in effect at each month end.
    ///
    /// The classifier here is deliberately self-contained: it learns its
    /// distribution from the whole table it was handed. Out-of-sample
    /// isolation of the fit window is the walk-forward engine's concern, not
    /// this engine's.
    fn build_regime(&self) -> Result<Vec<(NaiveDate, Option<Regime>)>> {
        let mut engine = RegimeEngine::new(self.config.regime.clone());
        engine.fit(&self.frame)?;
        let labels = engine.predict(&self.frame)?;
        Ok(labels.month_end_labels(self.frame.dates()))
    }

    fn generate_weights(
        &self,
        monthly_returns: &Frame,
        momentum: &Frame,
        regime_monthly: &[(NaiveDate, Option<Regime>)],
    ) -> Result<Frame> {
        let assets = &self.config.assets;
        let hedge_idx = assets
            .iter()
            .position(|a| a == &self.config.hedge_asset)
            .expect("validated hedge asset");

        let regime_dates: Vec<NaiveDate> = regime_monthly.iter().map(|(d, _)| *d).collect();
        let common = intersect_dates(
            &intersect_dates(monthly_returns.dates(), momentum.dates()),
            &regime_dates,
        );
        let momentum_aligned = momentum.reindex(&common);

        let mut raw: Vec<Vec<Option<f64>>> = vec![vec![Some(0.0); common.len()]; assets.len()];
        for (row, date) in common.iter().enumerate() {
            let momentum_row: Vec<Option<f64>> = (0..assets.len())
                .map(|col| momentum_aligned.get(row, col))
                .collect();
            // No momentum signal anywhere this month: leave the row flat.
            if momentum_row.iter().all(|m| m.is_none()) {
                continue;
            }

            let regime = regime_dates
                .binary_search(date)
                .ok()
                .and_then(|i| regime_monthly[i].1);
            let (equity_share, hedge_share) = allocation(regime);

            let mut ranked: Vec<(usize, f64)> = momentum_row
                .iter()
                .enumerate()
                .filter(|(col, _)| *col != hedge_idx)
                .filter_map(|(col, m)| m.map(|m| (col, m)))
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

            if let Some(&(top, _)) = ranked.first() {
                raw[top][row] = Some(equity_share);
            }
            raw[hedge_idx][row] = Some(hedge_share);
        }
        let raw = Frame::new(common, assets.clone(), raw)?;

        // The one-period shift is what keeps this month's regime/momentum
        // decision off this month's realized return. The vacated first row
        // is flat.
        let shifted = raw.shift(1).fill_none(0.0);

        let mut risk = RiskEngine::new(monthly_returns.clone(), self.config.vol_lookback);
        risk.apply_inverse_vol_weights(&shifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::month_end;

    fn monthly_dates(start_year: i32, months: usize) -> Vec<NaiveDate> {
        (0..months)
            .map(|i| {
                month_end(
                    NaiveDate::from_ymd_opt(start_year + (i / 12) as i32, (i % 12) as u32 + 1, 1)
                        .unwrap(),
                )
            })
            .collect()
    }

    /// Monthly table with a macro pair whose growth oscillates through all
    /// regime bands and three drifting, wobbling asset prices.
    fn rotation_frame(months: usize) -> Frame {
        let dates = monthly_dates(2005, months);
        let mut m2 = 10_000.0;
        let mut ecb = 5_000.0;
        let mut nifty = 100.0;
        let mut spy = 200.0;
        let mut gld = 50.0;

        let mut cols: Vec<Vec<Option<f64>>> = vec![Vec::new(); 5];
        for i in 0..months {
            let cycle = (i as f64 * 0.45).sin();
            m2 *= 1.0 + 0.01 + 0.02 * cycle;
            ecb *= 1.0 + 0.01 - 0.015 * cycle;
            nifty *= 1.0 + 0.008 + 0.03 * (i as f64 * 0.8).sin();
            spy *= 1.0 + 0.006 + 0.02 * (i as f64 * 1.1).cos();
            gld *= 1.0 + 0.004 + 0.015 * (i as f64 * 0.6).sin();

            cols[0].push(Some(m2));
            cols[1].push(Some(ecb));
            cols[2].push(Some(nifty));
            cols[3].push(Some(spy));
            cols[4].push(Some(gld));
        }

        Frame::new(
            dates,
            vec![
                "US_M2".to_string(),
                "ECB_ASSETS".to_string(),
                "NIFTY".to_string(),
                "SPY".to_string(),
                "GLD".to_string(),
            ],
            cols,
        )
        .unwrap()
    }

    #[test]
    fn test_allocation_table() {
        assert_eq!(allocation(Some(Regime::StrongRiskOn)), (0.80, 0.20));
        assert_eq!(allocation(Some(Regime::ModerateRiskOn)), (0.60, 0.40));
        assert_eq!(allocation(Some(Regime::Defensive)), (0.30, 0.70));
        assert_eq!(allocation(Some(Regime::StrongRiskOff)), (0.0, 1.0));
        assert_eq!(allocation(None), (0.0, 1.0));
    }

    #[test]
    fn test_config_validation() {
        let mut config = RotationConfig::default();
        config.hedge_asset = "SILVER".to_string();
        assert!(matches!(
            MultiAssetRotationEngine::new(rotation_frame(24), config),
            Err(BacktestError::ConfigError(_))
        ));
    }

    #[test]
    fn test_backtest_outputs_are_aligned() {
        let engine =
            MultiAssetRotationEngine::new(rotation_frame(120), RotationConfig::default()).unwrap();
        let result = engine.backtest().unwrap();

        assert_eq!(result.weights.dates(), result.turnover.dates());
        assert_eq!(result.weights.dates(), result.portfolio_returns.dates());
        assert_eq!(result.portfolio_returns.len(), result.equity_curve.len());
        assert!(!result.portfolio_returns.is_empty());
    }

    #[test]
    fn test_weight_rows_sum_to_zero_or_one() {
        let engine =
            MultiAssetRotationEngine::new(rotation_frame(120), RotationConfig::default()).unwrap();
        let result = engine.backtest().unwrap();

        for row in 0..result.weights.len() {
            let total: f64 = (0..3).filter_map(|col| result.weights.get(row, col)).sum();
            assert!(
                (total - 1.0).abs() < 1e-9 || total.abs() < 1e-9,
                "row {} sums to {}",
                row,
                total
            );
        }
    }

    #[test]
    fn test_first_weight_row_is_flat() {
        let engine =
            MultiAssetRotationEngine::new(rotation_frame(120), RotationConfig::default()).unwrap();
        let result = engine.backtest().unwrap();

        for col in 0..3 {
            assert_eq!(result.weights.get(0, col), Some(0.0));
        }
        assert_eq!(result.turnover.values()[0], Some(0.0));
    }

    #[test]
    fn test_turnover_is_bounded() {
        let engine =
            MultiAssetRotationEngine::new(rotation_frame(120), RotationConfig::default()).unwrap();
        let result = engine.backtest().unwrap();

        for v in result.turnover.values() {
            let t = v.unwrap();
            assert!((0.0..=2.0 + 1e-9).contains(&t), "turnover {} out of bounds", t);
        }
    }

    #[test]
    fn test_degenerate_macro_fails_backtest() {
        // Constant macro growth makes the liquidity composite degenerate,
        // and the failure must propagate out of backtest().
        let base = rotation_frame(60);
        let dates = base.dates().to_vec();
        let mut cols: Vec<Vec<Option<f64>>> = Vec::new();
        for (i, name) in base.columns().iter().enumerate() {
            let col = if name == "US_M2" || name == "ECB_ASSETS" {
                // Exact doubling keeps the growth rate at exactly 1.0, so
                // the composite is exactly constant.
                (0..base.len())
                    .map(|r| Some(1000.0 * 2.0_f64.powi(r as i32)))
                    .collect()
            } else {
                (0..base.len()).map(|r| base.get(r, i)).collect()
            };
            cols.push(col);
        }
        let frame = Frame::new(dates, base.columns().to_vec(), cols).unwrap();

        let engine = MultiAssetRotationEngine::new(frame, RotationConfig::default()).unwrap();
        assert!(matches!(
            engine.backtest(),
            Err(BacktestError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn test_no_lookahead_in_weights() {
        let months = 120;
        let base = rotation_frame(months);
        let engine =
            MultiAssetRotationEngine::new(base.clone(), RotationConfig::default()).unwrap();
        let baseline = engine.backtest().unwrap();

        // Perturb every asset price strictly after the cutoff month. Macro
        // columns stay untouched.
        let cutoff = base.dates()[months - 6];
        let dates = base.dates().to_vec();
        let mut cols: Vec<Vec<Option<f64>>> = Vec::new();
        for (i, name) in base.columns().iter().enumerate() {
            let mut col: Vec<Option<f64>> = (0..base.len()).map(|r| base.get(r, i)).collect();
            if name != "US_M2" && name != "ECB_ASSETS" {
                for (r, date) in dates.iter().enumerate() {
                    if *date > cutoff {
                        col[r] = col[r].map(|v| v * 1.7 + (r as f64).sin() * 10.0);
                    }
                }
            }
            cols.push(col);
        }
        let perturbed_frame = Frame::new(dates, base.columns().to_vec(), cols).unwrap();

        let engine =
            MultiAssetRotationEngine::new(perturbed_frame, RotationConfig::default()).unwrap();
        let perturbed = engine.backtest().unwrap();

        for (row, date) in baseline.weights.dates().iter().enumerate() {
            if *date > cutoff {
                break;
            }
            for col in 0..3 {
                assert_eq!(
                    baseline.weights.get(row, col),
                    perturbed.weights.get(row, col),
                    "weight at {} column {} changed under future perturbation",
                    date,
                    col
                );
            }
        }
    }
}
