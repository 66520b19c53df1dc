//! Performance analytics and reporting.
//!
//! Pure, stateless aggregations over a finished return series. None of these
//! feed back into weight construction, so they carry no temporal-ordering
//! hazard; they exist to summarize what the walk-forward engines produced.

use crate::frame::Series;
use colored::Colorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

/// Annualized compound growth rate of a periodic return series.
///
/// Returns `None` for an empty series or when the cumulative growth is
/// non-positive (a total loss has no real growth rate).
pub fn annualized_return(returns: &Series, periods_per_year: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let cumulative: f64 = returns
        .values()
        .iter()
        .flatten()
        .fold(1.0, |acc, r| acc * (1.0 + r));
    let years = returns.len() as f64 / periods_per_year;
    if years == 0.0 || cumulative <= 0.0 {
        return None;
    }
    Some(cumulative.powf(1.0 / years) - 1.0)
}

/// Annualized sample volatility of a periodic return series.
pub fn annualized_volatility(returns: &Series, periods_per_year: f64) -> Option<f64> {
    returns.std().map(|s| s * periods_per_year.sqrt())
}

/// Annualized Sharpe ratio, assuming excess returns (risk-free rate ~ 0).
///
/// Returns `None` when the return spread is zero or undefined.
pub fn sharpe_ratio(returns: &Series, periods_per_year: f64) -> Option<f64> {
    let mean = returns.mean()?;
    let std = returns.std()?;
    if std == 0.0 {
        return None;
    }
    Some(mean / std * periods_per_year.sqrt())
}

/// Maximum drawdown of a cumulative equity curve, as a negative fraction of
/// the running peak.
pub fn max_drawdown(equity_curve: &Series) -> Option<f64> {
    let mut peak: Option<f64> = None;
    let mut worst: Option<f64> = None;
    for value in equity_curve.values().iter().flatten() {
        let p = peak.map_or(*value, |p: f64| p.max(*value));
        peak = Some(p);
        if p > 0.0 {
            let dd = (value - p) / p;
            worst = Some(worst.map_or(dd, |w: f64| w.min(dd)));
        }
    }
    worst
}

/// Scalar summary of an out-of-sample return series.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    /// Number of periods in the series.
    pub periods: usize,
    /// Total compound return over the series.
    pub total_return: Option<f64>,
    /// Annualized compound growth rate.
    pub annualized_return: Option<f64>,
    /// Annualized sample volatility.
    pub annualized_volatility: Option<f64>,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: Option<f64>,
    /// Maximum drawdown, negative fraction of the peak.
    pub max_drawdown: Option<f64>,
}

impl PerformanceSummary {
    /// Summarize a periodic return series.
    pub fn from_returns(returns: &Series, periods_per_year: f64) -> Self {
        let equity = returns.cum_growth();
        let total_return = equity
            .values()
            .last()
            .and_then(|v| *v)
            .map(|level| level - 1.0);
        Self {
            periods: returns.len(),
            total_return,
            annualized_return: annualized_return(returns, periods_per_year),
            annualized_volatility: annualized_volatility(returns, periods_per_year),
            sharpe_ratio: sharpe_ratio(returns, periods_per_year),
            max_drawdown: max_drawdown(&equity),
        }
    }

    /// Render a two-column metric table.
    pub fn render(&self) -> String {
        let mut builder = Builder::new();
        builder.push_record(["Metric", "Value"]);
        builder.push_record(["Periods", &self.periods.to_string()]);
        builder.push_record(["Total Return", &fmt_signed_pct(self.total_return)]);
        builder.push_record(["Annualized Return", &fmt_signed_pct(self.annualized_return)]);
        builder.push_record(["Annualized Volatility", &fmt_pct(self.annualized_volatility)]);
        builder.push_record(["Sharpe Ratio", &fmt_ratio(self.sharpe_ratio)]);
        builder.push_record(["Max Drawdown", &fmt_pct(self.max_drawdown)]);
        builder.build().with(Style::rounded()).to_string()
    }
}

fn fmt_signed_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 0.0 => format!("+{:.2}%", v * 100.0).green().to_string(),
        Some(v) => format!("{:.2}%", v * 100.0).red().to_string(),
        None => "n/a".dimmed().to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".dimmed().to_string(),
    }
}

fn fmt_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: Vec<Option<f64>>) -> Series {
        let dates = (0..values.len())
            .map(|i| {
                crate::frame::month_end(
                    NaiveDate::from_ymd_opt(2015 + (i / 12) as i32, (i % 12) as u32 + 1, 1)
                        .unwrap(),
                )
            })
            .collect();
        Series::new(dates, values).unwrap()
    }

    #[test]
    fn test_annualized_return_of_constant_growth() {
        // 1% per month for two years compounds to (1.01)^12 - 1 annualized.
        let returns = series(vec![Some(0.01); 24]);
        let cagr = annualized_return(&returns, 12.0).unwrap();
        assert!((cagr - (1.01_f64.powi(12) - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_annualized_return_empty_is_none() {
        let returns = series(vec![]);
        assert_eq!(annualized_return(&returns, 12.0), None);
    }

    #[test]
    fn test_sharpe_undefined_for_flat_returns() {
        let returns = series(vec![Some(0.0); 12]);
        assert_eq!(sharpe_ratio(&returns, 12.0), None);

        let rising = series(vec![Some(0.01), Some(0.02), Some(0.03), Some(0.02)]);
        assert!(sharpe_ratio(&rising, 12.0).unwrap() > 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let equity = series(vec![Some(1.0), Some(1.2), Some(0.6), Some(0.9), Some(1.3)]);
        let dd = max_drawdown(&equity).unwrap();
        assert!((dd - (0.6 - 1.2) / 1.2).abs() < 1e-12);

        let monotone = series(vec![Some(1.0), Some(1.1), Some(1.2)]);
        assert_eq!(max_drawdown(&monotone), Some(0.0));
    }

    #[test]
    fn test_summary_of_zero_returns() {
        let returns = series(vec![Some(0.0); 36]);
        let summary = PerformanceSummary::from_returns(&returns, 12.0);

        assert_eq!(summary.periods, 36);
        assert_eq!(summary.total_return, Some(0.0));
        assert_eq!(summary.annualized_return, Some(0.0));
        assert_eq!(summary.sharpe_ratio, None);
        assert_eq!(summary.max_drawdown, Some(0.0));
    }

    #[test]
    fn test_render_includes_all_metrics() {
        let returns = series(vec![Some(0.02), Some(-0.01), Some(0.015), Some(0.03)]);
        let table = PerformanceSummary::from_returns(&returns, 12.0).render();
        assert!(table.contains("Sharpe Ratio"));
        assert!(table.contains("Max Drawdown"));
    }
}
