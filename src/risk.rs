//! Risk budgeting over a weight matrix.
//!
//! Pure risk math: the engine sees a table of asset returns and a table of
//! intended weights, nothing else. It knows nothing about regimes, momentum,
//! or why a weight was proposed; it only reallocates toward lower-volatility
//! assets and renormalizes exposure.

use crate::error::{BacktestError, Result};
use crate::frame::{Frame, MONTHS_PER_YEAR};
use tracing::debug;

/// Inverse-volatility risk budget engine.
pub struct RiskEngine {
    returns: Frame,
    vol_lookback: usize,
    volatility: Option<Frame>,
}

impl RiskEngine {
    /// Create an engine over a periodic return table.
    pub fn new(returns: Frame, vol_lookback: usize) -> Self {
        Self {
            returns,
            vol_lookback,
            volatility: None,
        }
    }

    /// Rolling annualized volatility per asset, cached after the first
    /// computation.
    pub fn compute_volatility(&mut self) -> &Frame {
        if self.volatility.is_none() {
            let vol = self
                .returns
                .rolling_std(self.vol_lookback)
                .map_values(|v| v * MONTHS_PER_YEAR.sqrt());
            debug!(
                lookback = self.vol_lookback,
                rows = vol.len(),
                "computed rolling volatility"
            );
            self.volatility = Some(vol);
        }
        self.volatility.as_ref().unwrap()
    }

    /// Rescale each weight by the reciprocal of its asset's volatility and
    /// renormalize every row to unit exposure.
    ///
    /// Zero volatility is treated as undefined: the asset is excluded from
    /// the row rather than divided by. Rows whose total scaled exposure is
    /// zero (no volatility estimate yet, or no assignable weight) come back
    /// all-zero, never NaN.
    pub fn apply_inverse_vol_weights(&mut self, raw_weights: &Frame) -> Result<Frame> {
        if raw_weights.columns() != self.returns.columns() {
            return Err(BacktestError::DataError(format!(
                "weight columns {:?} do not match return columns {:?}",
                raw_weights.columns(),
                self.returns.columns()
            )));
        }

        let vol = self.compute_volatility().reindex(raw_weights.dates());
        let n_cols = raw_weights.columns().len();

        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(raw_weights.len()); n_cols];
        for row in 0..raw_weights.len() {
            let scaled: Vec<Option<f64>> = (0..n_cols)
                .map(|col| {
                    let inv_vol = match vol.get(row, col) {
                        Some(v) if v != 0.0 => Some(1.0 / v),
                        _ => None,
                    };
                    match (raw_weights.get(row, col), inv_vol) {
                        (Some(w), Some(iv)) => Some(w * iv),
                        _ => None,
                    }
                })
                .collect();

            let exposure: f64 = scaled.iter().flatten().sum();
            for (col, cell) in scaled.into_iter().enumerate() {
                let normalized = if exposure == 0.0 {
                    0.0
                } else {
                    cell.map(|s| s / exposure).unwrap_or(0.0)
                };
                columns[col].push(Some(normalized));
            }
        }

        Frame::new(
            raw_weights.dates().to_vec(),
            raw_weights.columns().to_vec(),
            columns,
        )
    }
}
