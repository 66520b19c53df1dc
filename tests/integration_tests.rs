//! End-to-end walk-forward scenarios over synthetic data.

use chrono::NaiveDate;
use meridian::error::BacktestError;
use meridian::frame::{month_end, Frame};
use meridian::regime::RegimeConfig;
use meridian::rotation::{MultiAssetRotationEngine, RotationConfig};
use meridian::walkforward::WalkForwardEngine;

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

/// Fifteen years of monthly data: a macro pair whose liquidity composite
/// cycles through all four regime bands, and three drifting assets.
fn synthetic_table(start_year: i32, months: usize) -> Frame {
    let dates = monthly_dates(start_year, months);
    let mut m2 = 21_000.0;
    let mut ecb = 8_000.0;
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
fn test_oos_regime_walkforward() {
    let table = synthetic_table(2003, 180);
    let engine = WalkForwardEngine::new(table.clone(), 10).unwrap();
    let splits = engine.generate_splits().unwrap();
    let labels = engine.run(&RegimeConfig::default()).unwrap();

    // Every test window contributes its length minus the composite warmup
    // (one differencing step plus the three-month smoothing window).
    let expected: usize = splits
        .iter()
        .map(|s| table.slice(s.test_start, s.test_end).len().saturating_sub(3))
        .sum();
    assert_eq!(labels.len(), expected);

    // Labels live strictly inside the test region and come out sorted.
    assert!(labels.dates().iter().all(|d| *d >= splits[0].test_start));
    for pair in labels.dates().windows(2) {
        assert!(pair[0] <= pair[1]);
    }

    // The oscillating composite should visit several bands out of sample.
    let distinct: std::collections::HashSet<_> = labels.regimes().iter().collect();
    assert!(distinct.len() >= 3, "only {} regimes seen", distinct.len());
}

#[test]
fn test_oos_portfolio_backtest_series_is_clean() {
    let table = synthetic_table(2003, 180);
    let engine = WalkForwardEngine::new(table, 10).unwrap();
    let splits = engine.generate_splits().unwrap();
    let returns = engine
        .run_portfolio_backtest(&RotationConfig::default())
        .unwrap();

    assert!(!returns.is_empty());

    // Strictly increasing dates: boundary months shared by adjacent test
    // windows were deduplicated.
    for pair in returns.dates().windows(2) {
        assert!(pair[0] < pair[1]);
    }

    let first_test = splits.first().unwrap().test_start;
    let last_test = splits.last().unwrap().test_end;
    assert!(returns.dates().iter().all(|d| *d >= first_test && *d <= last_test));

    // Equity never hits zero on net-of-cost monthly returns.
    let equity = returns.cum_growth();
    assert!(equity.values().iter().all(|v| v.unwrap() > 0.0));
}

#[test]
fn test_full_history_rotation_backtest_properties() {
    let table = synthetic_table(2003, 180);
    let engine = MultiAssetRotationEngine::new(table, RotationConfig::default()).unwrap();
    let result = engine.backtest().unwrap();

    // Weight rows are a distribution or flat.
    for row in 0..result.weights.len() {
        let total: f64 = (0..3).filter_map(|col| result.weights.get(row, col)).sum();
        assert!((total - 1.0).abs() < 1e-9 || total.abs() < 1e-9);
    }

    // Turnover of a fully-invested long-only book is at most a full swap.
    for v in result.turnover.values() {
        let t = v.unwrap();
        assert!((0.0..=2.0 + 1e-9).contains(&t));
    }

    // The equity curve is strictly positive throughout.
    assert!(result
        .equity_curve
        .values()
        .iter()
        .all(|v| v.unwrap() > 0.0));
}

#[test]
fn test_walkforward_matches_sequential_expectations_on_boundaries() {
    let table = synthetic_table(2003, 180);
    let engine = WalkForwardEngine::new(table, 10).unwrap();
    let splits = engine.generate_splits().unwrap();

    // Contiguous tiling of the test axis.
    assert_eq!(splits[0].train_end, splits[0].test_start);
    for pair in splits.windows(2) {
        assert_eq!(pair[0].test_end, pair[1].test_start);
    }
    assert_eq!(
        splits.last().unwrap().test_end,
        month_end(NaiveDate::from_ymd_opt(2017, 12, 1).unwrap())
    );
}

#[test]
fn test_asset_that_never_reports_fails_cleanly() {
    let base = synthetic_table(2003, 180);
    let dates = base.dates().to_vec();
    let mut cols: Vec<Vec<Option<f64>>> = Vec::new();
    for (i, name) in base.columns().iter().enumerate() {
        let col = if name == "GLD" {
            vec![None; base.len()]
        } else {
            (0..base.len()).map(|r| base.get(r, i)).collect()
        };
        cols.push(col);
    }
    let table = Frame::new(dates, base.columns().to_vec(), cols).unwrap();

    // GLD exists as a column but never reports, so the walk-forward start
    // date cannot be resolved.
    let engine = WalkForwardEngine::new(table, 10).unwrap();
    let result = engine.run_portfolio_backtest(&RotationConfig::default());
    assert!(matches!(result, Err(BacktestError::DataError(_))));
}

#[test]
fn test_unknown_asset_column_fails_cleanly() {
    let table = synthetic_table(2003, 180);
    let engine = WalkForwardEngine::new(table, 10).unwrap();

    let mut config = RotationConfig::default();
    config.assets = vec!["NIFTY".to_string(), "BTC".to_string(), "GLD".to_string()];
    assert!(matches!(
        engine.run_portfolio_backtest(&config),
        Err(BacktestError::MissingColumn(_))
    ));
}
