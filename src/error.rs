//! Error types for the backtest engine.

use thiserror::Error;

/// Main error type for the backtest engine.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid date index: {0}")]
    InvalidIndex(String),

    #[error("Required column missing: {0}")]
    MissingColumn(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Liquidity composite empty after preprocessing")]
    EmptySeries,

    #[error("Invalid training distribution: {0}")]
    InvalidDistribution(String),

    #[error("Regime engine must be fitted before predict")]
    NotFitted,

    #[error("No usable out-of-sample data: {0}")]
    NoUsableData(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for backtest operations.
pub type Result<T> = std::result::Result<T, BacktestError>;
