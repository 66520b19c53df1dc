//! Walk-forward out-of-sample validation.
//!
//! Partitions a date-indexed table into successive expanding-train /
//! one-year-test splits and runs either the regime classifier (fit on the
//! train slice, predict on the test slice) or the full rotation engine
//! (expanding window through each split's test end) per split, then stitches
//! the harvested test slices into one continuous out-of-sample series.
//!
//! Splits are independent computations: they run in parallel and are merged
//! in split order, so the output is identical to sequential execution
//! regardless of completion order.

use crate::error::{BacktestError, Result};
use crate::frame::{add_years, Frame, Series};
use crate::regime::{RegimeConfig, RegimeEngine, RegimeSeries};
use crate::rotation::{MultiAssetRotationEngine, RotationConfig};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One walk-forward split. Training always expands from the common start
/// date; test windows tile the remainder without gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Training window start (the start date of every split).
    pub train_start: NaiveDate,
    /// Training window end; equals `test_start`.
    pub train_end: NaiveDate,
    /// Test window start; equals the previous split's `test_end`.
    pub test_start: NaiveDate,
    /// Test window end, clamped to the final available date.
    pub test_end: NaiveDate,
}

impl Split {
    /// Length of the test window in days.
    pub fn test_days(&self) -> i64 {
        (self.test_end - self.test_start).num_days()
    }
}

/// Walk-forward validation engine over one date-indexed table.
pub struct WalkForwardEngine {
    frame: Frame,
    warmup_years: i32,
}

impl WalkForwardEngine {
    /// Create an engine. The table must carry a non-empty chronological
    /// index ([`Frame`] construction already rejects unsorted or duplicate
    /// dates) and the warmup must be at least one year.
    pub fn new(frame: Frame, warmup_years: i32) -> Result<Self> {
        if frame.is_empty() {
            return Err(BacktestError::InvalidIndex(
                "walk-forward input has an empty date index".to_string(),
            ));
        }
        if warmup_years <= 0 {
            return Err(BacktestError::ConfigError(
                "warmup must be at least one year".to_string(),
            ));
        }
        Ok(Self {
            frame,
            warmup_years,
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// First date at which every column has begun reporting: the latest
    /// first-valid-observation date across all columns.
    pub fn start_date(&self) -> Result<NaiveDate> {
        let mut start: Option<NaiveDate> = None;
        for name in self.frame.columns() {
            let first = self.frame.column_first_valid(name)?.ok_or_else(|| {
                BacktestError::DataError(format!("column {} has no valid observations", name))
            })?;
            start = Some(start.map_or(first, |s| s.max(first)));
        }
        start.ok_or_else(|| BacktestError::DataError("table has no columns".to_string()))
    }

    /// Partition the timeline from the common start date: after the warmup,
    /// emit contiguous one-year test windows with expanding training
    /// windows, the final window clamped to the last available date.
    pub fn generate_splits(&self) -> Result<Vec<Split>> {
        let start = self.start_date()?;
        let final_date = *self
            .frame
            .dates()
            .last()
            .ok_or_else(|| BacktestError::InvalidIndex("empty date index".to_string()))?;

        let mut splits = Vec::new();
        let mut test_start = add_years(start, self.warmup_years);
        while test_start < final_date {
            let test_end = add_years(test_start, 1).min(final_date);
            splits.push(Split {
                train_start: start,
                train_end: test_start,
                test_start,
                test_end,
            });
            test_start = test_end;
        }

        info!(
            count = splits.len(),
            %start,
            %final_date,
            "generated walk-forward splits"
        );
        Ok(splits)
    }

    /// Out-of-sample regime classification: per split, fit on the training
    /// slice only and predict the test slice with that distribution, then
    /// concatenate all predicted labels sorted by date.
    ///
    /// A fit failure on any split (empty or degenerate liquidity composite)
    /// aborts the whole run.
    pub fn run(&self, regime_config: &RegimeConfig) -> Result<RegimeSeries> {
        let splits = self.generate_splits()?;
        if splits.is_empty() {
            return Err(BacktestError::NoUsableData(
                "the series ends inside the warmup window".to_string(),
            ));
        }

        let pieces: Vec<RegimeSeries> = splits
            .par_iter()
            .map(|split| {
                info!(
                    train_start = %split.train_start,
                    train_end = %split.train_end,
                    "training regime window"
                );
                let train = self.frame.slice(split.train_start, split.train_end);
                let test = self.frame.slice(split.test_start, split.test_end);

                let mut engine = RegimeEngine::new(regime_config.clone());
                engine.fit(&train)?;
                engine.predict(&test)
            })
            .collect::<Result<Vec<_>>>()?;

        RegimeSeries::concat_sorted(&pieces)
    }

    /// Out-of-sample portfolio backtest: per split, run the full rotation
    /// engine over all data from the assets' common start through the
    /// split's test end, deduct turnover costs, and harvest only the slice
    /// inside the test window.
    ///
    /// Splits whose portfolio result is empty are logged and skipped; the
    /// call fails with [`BacktestError::NoUsableData`] only when every split
    /// is degenerate. The merged series is sorted with duplicate boundary
    /// dates dropped, first occurrence kept.
    pub fn run_portfolio_backtest(&self, config: &RotationConfig) -> Result<Series> {
        config.validate()?;
        let splits = self.generate_splits()?;
        if splits.is_empty() {
            return Err(BacktestError::NoUsableData(
                "the series ends inside the warmup window".to_string(),
            ));
        }

        let asset_start = self
            .frame
            .select(&config.assets)?
            .dropna_rows()
            .dates()
            .first()
            .copied()
            .ok_or_else(|| {
                BacktestError::NoUsableData(
                    "rotation assets never report simultaneously".to_string(),
                )
            })?;
        info!(%asset_start, "portfolio asset start date");
        let valid = self.frame.slice_from(asset_start);

        let harvested = splits
            .par_iter()
            .map(|split| -> Result<Option<Series>> {
                let combined = valid.slice_through(split.test_end);
                info!(
                    test_start = %split.test_start,
                    test_end = %split.test_end,
                    rows = combined.len(),
                    "out-of-sample portfolio window"
                );

                let engine = MultiAssetRotationEngine::new(combined, config.clone())?;
                let result = engine.backtest()?;

                if result.portfolio_returns.is_empty()
                    || result.portfolio_returns.count_valid() == 0
                {
                    warn!(
                        test_start = %split.test_start,
                        test_end = %split.test_end,
                        "portfolio window produced no returns; skipping"
                    );
                    return Ok(None);
                }

                let cost = config.transaction_cost;
                let net = result
                    .portfolio_returns
                    .zip_with(&result.turnover, |r, t| match (r, t) {
                        (Some(r), Some(t)) => Some(r - t * cost),
                        _ => None,
                    })?;

                let oos = net.slice(split.test_start, split.test_end);
                if oos.is_empty() {
                    warn!(
                        test_start = %split.test_start,
                        test_end = %split.test_end,
                        "out-of-sample slice empty; skipping"
                    );
                    return Ok(None);
                }
                Ok(Some(oos))
            })
            .collect::<Result<Vec<_>>>()?;

        let kept: Vec<Series> = harvested.into_iter().flatten().collect();
        if kept.is_empty() {
            return Err(BacktestError::NoUsableData(
                "portfolio engine produced no usable out-of-sample returns".to_string(),
            ));
        }

        let merged = Series::concat_dedup_first(&kept)?;
        info!(months = merged.len(), "assembled out-of-sample return series");
        Ok(merged)
    }
}
