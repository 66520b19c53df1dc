//! Configuration file support.
//!
//! Backtest runs are reproducible from a single TOML file: data location,
//! walk-forward warmup, and the full rotation strategy configuration. Every
//! field has a default, so a minimal file (or none at all) is valid.

use crate::data::DataConfig;
use crate::error::Result;
use crate::rotation::RotationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Data settings.
    #[serde(default)]
    pub data: DataSettings,
    /// Walk-forward settings.
    #[serde(default)]
    pub walkforward: WalkForwardSettings,
    /// Rotation strategy settings, vol targeting and regime included.
    #[serde(default)]
    pub portfolio: RotationConfig,
}

/// Data settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSettings {
    /// Path to the CSV table.
    #[serde(default)]
    pub path: Option<String>,
    /// Date format in the CSV (chrono syntax). Common formats are attempted
    /// when unset.
    #[serde(default)]
    pub date_format: Option<String>,
}

fn default_warmup_years() -> i32 {
    10
}

/// Walk-forward settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSettings {
    /// Years of history reserved for the first training window.
    #[serde(default = "default_warmup_years")]
    pub warmup_years: i32,
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            warmup_years: default_warmup_years(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loader settings for the CSV reader.
    pub fn data_config(&self) -> DataConfig {
        DataConfig {
            date_format: self.data.date_format.clone(),
            ..DataConfig::default()
        }
    }
}
