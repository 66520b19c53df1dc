//! Command-line interface for the walk-forward backtester.

use meridian::analytics::PerformanceSummary;
use meridian::config::FileConfig;
use meridian::data::load_csv;
use meridian::error::{BacktestError, Result};
use meridian::frame::{Frame, Series};
use meridian::walkforward::WalkForwardEngine;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Meridian - walk-forward backtester for liquidity-regime asset rotation.
#[derive(Parser)]
#[command(name = "meridian")]
#[command(version)]
#[command(about = "Walk-forward backtester for liquidity-regime multi-asset rotation")]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the walk-forward split table
    Splits {
        /// Path to the CSV data table
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Warmup years before the first test window
        #[arg(short, long)]
        warmup_years: Option<i32>,
    },

    /// Out-of-sample regime classification
    Regimes {
        /// Path to the CSV data table
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Warmup years before the first test window
        #[arg(short, long)]
        warmup_years: Option<i32>,
    },

    /// Out-of-sample portfolio backtest
    Backtest {
        /// Path to the CSV data table
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Warmup years before the first test window
        #[arg(short, long)]
        warmup_years: Option<i32>,

        /// Rotation assets (overrides the configuration file)
        #[arg(long, value_delimiter = ',')]
        assets: Option<Vec<String>>,

        /// Hedge asset (overrides the configuration file)
        #[arg(long)]
        hedge: Option<String>,

        /// Transaction cost per unit of turnover
        #[arg(long)]
        cost: Option<f64>,

        /// Write the out-of-sample return series to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

/// Parse arguments and dispatch.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Splits {
            data,
            config,
            warmup_years,
        } => {
            let (frame, file_config) = load_inputs(data, config)?;
            let warmup = warmup_years.unwrap_or(file_config.walkforward.warmup_years);
            let engine = WalkForwardEngine::new(frame, warmup)?;
            let splits = engine.generate_splits()?;

            match cli.output {
                OutputFormat::Text => {
                    let mut builder = Builder::new();
                    builder.push_record(["#", "Train Start", "Train End", "Test Start", "Test End"]);
                    for (i, split) in splits.iter().enumerate() {
                        builder.push_record([
                            (i + 1).to_string(),
                            split.train_start.to_string(),
                            split.train_end.to_string(),
                            split.test_start.to_string(),
                            split.test_end.to_string(),
                        ]);
                    }
                    println!("{}", builder.build().with(Style::rounded()));
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&splits)?);
                }
            }
        }

        Commands::Regimes {
            data,
            config,
            warmup_years,
        } => {
            let (frame, file_config) = load_inputs(data, config)?;
            let warmup = warmup_years.unwrap_or(file_config.walkforward.warmup_years);
            let engine = WalkForwardEngine::new(frame, warmup)?;
            let labels = engine.run(&file_config.portfolio.regime)?;

            match cli.output {
                OutputFormat::Text => {
                    for (date, regime) in labels.iter() {
                        println!("{}  {:>2}  {}", date, regime.to_numeric(), regime);
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&labels)?);
                }
            }
        }

        Commands::Backtest {
            data,
            config,
            warmup_years,
            assets,
            hedge,
            cost,
            export,
        } => {
            let (frame, file_config) = load_inputs(data, config)?;
            let warmup = warmup_years.unwrap_or(file_config.walkforward.warmup_years);

            let mut rotation = file_config.portfolio.clone();
            if let Some(assets) = assets {
                rotation.assets = assets;
            }
            if let Some(hedge) = hedge {
                rotation.hedge_asset = hedge;
            }
            if let Some(cost) = cost {
                rotation.transaction_cost = cost;
            }

            let engine = WalkForwardEngine::new(frame, warmup)?;
            let returns = engine.run_portfolio_backtest(&rotation)?;
            let summary = PerformanceSummary::from_returns(&returns, 12.0);

            if let Some(path) = &export {
                export_returns(path, &returns)?;
                info!(path = %path.display(), "exported out-of-sample returns");
            }

            match cli.output {
                OutputFormat::Text => {
                    println!("{}", summary.render());
                }
                OutputFormat::Json => {
                    let payload = serde_json::json!({
                        "summary": summary,
                        "returns": returns,
                    });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_inputs(data: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<(Frame, FileConfig)> {
    let file_config = match config_path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let data_path = data
        .or_else(|| file_config.data.path.clone().map(PathBuf::from))
        .ok_or_else(|| {
            BacktestError::ConfigError(
                "no data path given (use --data or set [data].path)".to_string(),
            )
        })?;
    let frame = load_csv(&data_path, &file_config.data_config())?;
    Ok((frame, file_config))
}

fn export_returns(path: &Path, returns: &Series) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["date", "net_return"])?;
    for (date, value) in returns.iter() {
        writer.write_record([
            date.to_string(),
            value.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
