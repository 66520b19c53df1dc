//! Global-liquidity regime classification.
//!
//! A composite liquidity indicator is built from the growth rates of two
//! monetary aggregates, z-scored against a distribution learned on a training
//! window, and bucketed into four discrete regimes. Fit and predict are
//! strictly separated: `fit` learns `(mean, std)` from training data only and
//! returns it as an immutable [`TrainedDistribution`]; `predict` applies that
//! distribution to new data without ever recomputing statistics from its own
//! input. This is the temporal information boundary the walk-forward engine
//! relies on.

use crate::error::{BacktestError, Result};
use crate::frame::{month_end, Frame, Series};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Discrete liquidity regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Composite more than one standard deviation above the trained mean.
    StrongRiskOn,
    /// Composite in (0, 1] standard deviations above the mean.
    ModerateRiskOn,
    /// Composite in [-1, 0] standard deviations around the mean.
    Defensive,
    /// Composite more than one standard deviation below the mean.
    StrongRiskOff,
}

impl Regime {
    /// Numeric label (+2 / +1 / 0 / -1).
    pub fn to_numeric(&self) -> f64 {
        match self {
            Regime::StrongRiskOn => 2.0,
            Regime::ModerateRiskOn => 1.0,
            Regime::Defensive => 0.0,
            Regime::StrongRiskOff => -1.0,
        }
    }

    /// Classify a z-score against the fixed band thresholds. The +1 band is
    /// inclusive at its upper edge and the 0 band at both edges, so exactly
    /// 1.0 maps to [`Regime::ModerateRiskOn`] and exactly -1.0 to
    /// [`Regime::Defensive`].
    pub fn from_zscore(z: f64) -> Regime {
        if z > 1.0 {
            Regime::StrongRiskOn
        } else if z > 0.0 {
            Regime::ModerateRiskOn
        } else if z >= -1.0 {
            Regime::Defensive
        } else {
            Regime::StrongRiskOff
        }
    }

    pub fn is_risk_on(&self) -> bool {
        matches!(self, Regime::StrongRiskOn | Regime::ModerateRiskOn)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Regime::StrongRiskOn => "StrongRiskOn",
            Regime::ModerateRiskOn => "ModerateRiskOn",
            Regime::Defensive => "Defensive",
            Regime::StrongRiskOff => "StrongRiskOff",
        };
        write!(f, "{}", name)
    }
}

/// A date-indexed sequence of regime labels.
///
/// Dates are non-decreasing; duplicates can appear transiently when slices
/// from adjacent walk-forward windows are concatenated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeSeries {
    dates: Vec<NaiveDate>,
    regimes: Vec<Regime>,
}

impl RegimeSeries {
    pub fn new(dates: Vec<NaiveDate>, regimes: Vec<Regime>) -> Result<Self> {
        if dates.len() != regimes.len() {
            return Err(BacktestError::DataError(format!(
                "regime series length mismatch: {} dates, {} labels",
                dates.len(),
                regimes.len()
            )));
        }
        if dates.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(BacktestError::InvalidIndex(
                "regime series dates must be sorted ascending".to_string(),
            ));
        }
        Ok(Self { dates, regimes })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn regimes(&self) -> &[Regime] {
        &self.regimes
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Regime)> + '_ {
        self.dates.iter().copied().zip(self.regimes.iter().copied())
    }

    /// Most recent label at or before `date`, if any. This is the lookup
    /// behind forward-filled re-indexing: labels propagate forward, never
    /// backward.
    pub fn last_at_or_before(&self, date: NaiveDate) -> Option<Regime> {
        let idx = self.dates.partition_point(|&d| d <= date);
        if idx == 0 {
            None
        } else {
            Some(self.regimes[idx - 1])
        }
    }

    /// Collapse to one label per calendar month of `index`: the label in
    /// effect at the last index date of each month, stamped on the calendar
    /// month end. Months entirely before the first label stay unlabeled.
    pub fn month_end_labels(&self, index: &[NaiveDate]) -> Vec<(NaiveDate, Option<Regime>)> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < index.len() {
            let (year, month) = (index[i].year(), index[i].month());
            let mut last = index[i];
            while i < index.len() && index[i].year() == year && index[i].month() == month {
                last = index[i];
                i += 1;
            }
            out.push((month_end(last), self.last_at_or_before(last)));
        }
        out
    }

    /// Concatenate label slices and sort ascending (stable, so earlier
    /// slices win the ordering of equal dates).
    pub fn concat_sorted(pieces: &[RegimeSeries]) -> Result<RegimeSeries> {
        let mut pairs: Vec<(NaiveDate, Regime)> =
            pieces.iter().flat_map(|p| p.iter()).collect();
        pairs.sort_by_key(|(date, _)| *date);
        let (dates, regimes) = pairs.into_iter().unzip();
        RegimeSeries::new(dates, regimes)
    }
}

/// Mean and spread of the liquidity composite over a training window.
///
/// An immutable value: created once per walk-forward fit, applied to exactly
/// that split's predictions, then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainedDistribution {
    pub mean: f64,
    pub std: f64,
}

impl TrainedDistribution {
    pub fn zscore(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

fn default_money_supply_column() -> String {
    "US_M2".to_string()
}

fn default_central_bank_column() -> String {
    "ECB_ASSETS".to_string()
}

fn default_smoothing_window() -> usize {
    3
}

/// Configuration for the liquidity composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Money-supply aggregate column.
    #[serde(default = "default_money_supply_column")]
    pub money_supply_column: String,
    /// Central-bank balance-sheet column.
    #[serde(default = "default_central_bank_column")]
    pub central_bank_column: String,
    /// Rolling window smoothing each growth rate.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            money_supply_column: default_money_supply_column(),
            central_bank_column: default_central_bank_column(),
            smoothing_window: default_smoothing_window(),
        }
    }
}

/// Liquidity regime classifier with fit/predict separation.
#[derive(Debug, Clone, Default)]
pub struct RegimeEngine {
    config: RegimeConfig,
    fitted: Option<TrainedDistribution>,
}

impl RegimeEngine {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// The stored training distribution, if fitted.
    pub fn distribution(&self) -> Option<&TrainedDistribution> {
        self.fitted.as_ref()
    }

    /// Global liquidity composite: equal-weight mean of the smoothed
    /// period-over-period growth of the two aggregates. Defined only where
    /// both inputs carry the full smoothing window of trailing growth
    /// observations.
    pub fn liquidity_composite(&self, frame: &Frame) -> Result<Series> {
        frame.require_columns(&[
            &self.config.money_supply_column,
            &self.config.central_bank_column,
        ])?;

        let window = self.config.smoothing_window;
        let money_growth = frame
            .column(&self.config.money_supply_column)?
            .pct_change(1)
            .rolling_mean(window);
        let bank_growth = frame
            .column(&self.config.central_bank_column)?
            .pct_change(1)
            .rolling_mean(window);

        money_growth.zip_with(&bank_growth, |a, b| match (a, b) {
            (Some(x), Some(y)) => Some((x + y) / 2.0),
            _ => None,
        })
    }

    /// Learn the composite's distribution from training data only.
    ///
    /// Stores the distribution for subsequent [`predict`](Self::predict)
    /// calls and returns it as a value for pure
    /// [`predict_with`](Self::predict_with) use.
    pub fn fit(&mut self, train: &Frame) -> Result<TrainedDistribution> {
        let composite = self.liquidity_composite(train)?.dropna();
        if composite.is_empty() {
            return Err(BacktestError::EmptySeries);
        }

        let mean = composite
            .mean()
            .ok_or(BacktestError::EmptySeries)?;
        let std = composite.std().unwrap_or(f64::NAN);
        if std == 0.0 || !std.is_finite() {
            return Err(BacktestError::InvalidDistribution(format!(
                "training composite spread is {}",
                std
            )));
        }

        debug!(
            mean,
            std,
            observations = composite.len(),
            "fitted liquidity distribution"
        );

        let dist = TrainedDistribution { mean, std };
        self.fitted = Some(dist);
        Ok(dist)
    }

    /// Classify a window using the stored training distribution.
    pub fn predict(&self, frame: &Frame) -> Result<RegimeSeries> {
        let dist = self.fitted.ok_or(BacktestError::NotFitted)?;
        self.predict_with(&dist, frame)
    }

    /// Classify a window using an explicit training distribution. Pure:
    /// identical inputs always yield identical labels.
    pub fn predict_with(&self, dist: &TrainedDistribution, frame: &Frame) -> Result<RegimeSeries> {
        let composite = self.liquidity_composite(frame)?;

        // Label where the composite is defined, forward-fill interior gaps,
        // drop the leading warmup. Never back-fill.
        let mut last: Option<Regime> = None;
        let mut dates = Vec::new();
        let mut regimes = Vec::new();
        for (date, value) in composite.iter() {
            if let Some(v) = value {
                last = Some(Regime::from_zscore(dist.zscore(v)));
            }
            if let Some(regime) = last {
                dates.push(date);
                regimes.push(regime);
            }
        }

        RegimeSeries::new(dates, regimes)
    }
}
