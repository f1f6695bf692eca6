//! Runtime configuration read from an optional `ops_forecast.toml`.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
use crate::types::RecordKind;

pub const DEFAULT_CONFIG_FILE: &str = "ops_forecast.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_technician_daily_target")]
    pub technician_daily_target: u32,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default)]
    pub prefixes: SourcePrefixes,
}

/// File name prefixes used to find the newest export of each kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePrefixes {
    #[serde(default = "default_incoming_prefix")]
    pub incoming: String,
    #[serde(default = "default_completed_prefix")]
    pub completed: String,
    #[serde(default = "default_cancelled_prefix")]
    pub cancelled: String,
    #[serde(default = "default_leftover_prefix")]
    pub leftover: String,
}

impl Default for SourcePrefixes {
    fn default() -> Self {
        Self {
            incoming: default_incoming_prefix(),
            completed: default_completed_prefix(),
            cancelled: default_cancelled_prefix(),
            leftover: default_leftover_prefix(),
        }
    }
}

impl SourcePrefixes {
    pub fn for_kind(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Incoming => &self.incoming,
            RecordKind::Completed => &self.completed,
            RecordKind::Cancelled => &self.cancelled,
            RecordKind::Leftover => &self.leftover,
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_delimiter() -> char {
    ';'
}

fn default_technician_daily_target() -> u32 {
    6
}

fn default_preview_rows() -> usize {
    5
}

fn default_incoming_prefix() -> String {
    "salesforce_entrantes_hoje".to_string()
}

fn default_completed_prefix() -> String {
    "salesforce_finalizados".to_string()
}

fn default_cancelled_prefix() -> String {
    "salesforce_cancelados_hoje".to_string()
}

fn default_leftover_prefix() -> String {
    "salesforce_sobras_ontem".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_dir(),
            output_dir: default_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            delimiter: default_delimiter(),
            technician_daily_target: default_technician_daily_target(),
            preview_rows: default_preview_rows(),
            prefixes: SourcePrefixes::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ForecastError::Config {
            path: path.to_path_buf(),
            message: format!("Failed to read config file: {}", e),
        })?;
        Self::from_toml_str(&content).map_err(|message| ForecastError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load from `path` when given, else from `ops_forecast.toml` in the
    /// working directory, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            info!("Loading config from {}", p.display());
            return Self::from_file(p);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            info!("Loading config from {}", default_path.display());
            return Self::from_file(default_path);
        }
        debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(Self::default())
    }

    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b';'
        }
    }
}
