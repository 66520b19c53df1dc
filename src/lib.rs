//! Meridian - walk-forward backtesting for regime-conditioned asset rotation.
//!
//! # Overview
//!
//! Meridian backtests a global-liquidity-regime multi-asset rotation strategy
//! under a strict walk-forward, out-of-sample protocol:
//!
//! - **Regime classification**: a liquidity composite built from two monetary
//!   aggregates, z-scored against a distribution learned on training data
//!   only, bucketed into four discrete regimes
//! - **Rotation**: cross-sectional momentum picks the equity sleeve, the
//!   regime sets the equity/hedge split
//! - **Risk budgeting**: inverse-volatility rescaling of the weight matrix
//! - **Volatility targeting**: portfolio-level exposure scaling with a
//!   leverage cap
//! - **Walk-forward validation**: expanding training windows, contiguous
//!   one-year test windows, stitched into one continuous OOS series
//!
//! No parameter, label, or weight is ever computed from data after its
//! decision date: regime fit/predict are separated per split and weights are
//! shifted one period before any return touches them.
//!
//! # Quick Start
//!
//! ```no_run
//! use meridian::data::{load_csv, DataConfig};
//! use meridian::rotation::RotationConfig;
//! use meridian::walkforward::WalkForwardEngine;
//!
//! // A date-indexed CSV with macro aggregates and asset closes.
//! let table = load_csv("data/macro_assets.csv", &DataConfig::default()).unwrap();
//!
//! let engine = WalkForwardEngine::new(table, 10).unwrap();
//! let oos_returns = engine
//!     .run_portfolio_backtest(&RotationConfig::default())
//!     .unwrap();
//!
//! println!("out-of-sample months: {}", oos_returns.len());
//! ```
//!
//! # Modules
//!
//! - [`frame`]: date-indexed [`Series`]/[`Frame`] containers and transforms
//! - [`data`]: CSV loading
//! - [`regime`]: liquidity regime fit/predict
//! - [`risk`]: inverse-volatility risk budgeting
//! - [`vol_target`]: portfolio volatility targeting
//! - [`rotation`]: the staged rotation backtest pipeline
//! - [`strategy`]: regime-exposure and trend overlays on a benchmark
//! - [`walkforward`]: split generation and OOS orchestration
//! - [`analytics`]: performance summaries over finished return series
//! - [`config`]: TOML run configuration

pub mod analytics;
pub mod config;
pub mod data;
pub mod error;
pub mod frame;
pub mod regime;
pub mod risk;
pub mod rotation;
pub mod strategy;
pub mod vol_target;
pub mod walkforward;

// Re-exports for convenience
pub use analytics::{
    annualized_return, annualized_volatility, max_drawdown, sharpe_ratio, PerformanceSummary,
};
pub use config::FileConfig;
pub use data::{load_csv, DataConfig};
pub use error::{BacktestError, Result};
pub use frame::{Frame, Series};
pub use regime::{Regime, RegimeConfig, RegimeEngine, RegimeSeries, TrainedDistribution};
pub use risk::RiskEngine;
pub use rotation::{MultiAssetRotationEngine, RotationConfig, RotationResult};
pub use strategy::{trend_signal, ExposureConfig, StrategyEngine, StrategyResult};
pub use vol_target::{VolTargetConfig, VolTargetEngine};
pub use walkforward::{Split, WalkForwardEngine};
