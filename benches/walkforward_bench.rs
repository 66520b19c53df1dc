//! Performance benchmarks for the rotation and walk-forward engines.
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use meridian::frame::{month_end, Frame};
use meridian::regime::RegimeConfig;
use meridian::rotation::{MultiAssetRotationEngine, RotationConfig};
use meridian::walkforward::WalkForwardEngine;

/// Generate a synthetic macro/asset table for benchmarking.
fn generate_table(months: usize) -> Frame {
    let dates: Vec<NaiveDate> = (0..months)
        .map(|i| {
            month_end(
                NaiveDate::from_ymd_opt(2000 + (i / 12) as i32, (i % 12) as u32 + 1, 1).unwrap(),
            )
        })
        .collect();

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

fn bench_rotation_backtest(c: &mut Criterion) {
    let table = generate_table(240);

    c.bench_function("rotation_backtest_240m", |b| {
        b.iter(|| {
            let engine =
                MultiAssetRotationEngine::new(black_box(table.clone()), RotationConfig::default())
                    .unwrap();
            engine.backtest().unwrap()
        })
    });
}

fn bench_walkforward(c: &mut Criterion) {
    let table = generate_table(240);

    c.bench_function("walkforward_regimes_240m", |b| {
        b.iter(|| {
            let engine = WalkForwardEngine::new(black_box(table.clone()), 10).unwrap();
            engine.run(&RegimeConfig::default()).unwrap()
        })
    });

    c.bench_function("walkforward_portfolio_240m", |b| {
        b.iter(|| {
            let engine = WalkForwardEngine::new(black_box(table.clone()), 10).unwrap();
            engine
                .run_portfolio_backtest(&RotationConfig::default())
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_rotation_backtest, bench_walkforward);
criterion_main!(benches);
