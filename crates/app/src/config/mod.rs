use std::path::{Path, PathBuf};

use explorer_core::Timezone;
use explorer_core::mining::{
    DEFAULT_ANOMALY_LIMIT, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_SEQUENCE_WINDOW,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub db_path: PathBuf,
    /// Serve queries from the daily rollups when they are ready.
    pub prefer_materialized: bool,
    pub timezone: Timezone,
    pub log_filter: String,
    pub filter_options_limit: usize,
    pub default_page_size: u32,
    pub anomaly: AnomalyConfig,
    pub mining: MiningConfig,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("sessions.sqlite"),
            prefer_materialized: true,
            timezone: Timezone::Local,
            log_filter: "info".to_string(),
            filter_options_limit: 50,
            default_page_size: 25,
            anomaly: AnomalyConfig::default(),
            mining: MiningConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub threshold: f64,
    pub limit: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
            limit: DEFAULT_ANOMALY_LIMIT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MiningConfig {
    pub sequence_window: usize,
    pub limit: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            sequence_window: DEFAULT_SEQUENCE_WINDOW,
            limit: 50,
        }
    }
}

impl ExplorerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Defaults when the file does not exist; a file that exists must parse.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
