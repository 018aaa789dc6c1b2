//! Pipeline configuration.
//!
//! Values come from, in increasing priority: built-in defaults, a `.env`
//! file or process environment (`MEDALLION_*`), then command-line flags.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::transform::coerce::DEFAULT_TIMESTAMP_FORMAT;

pub const ENV_SOURCE_DIR: &str = "MEDALLION_SOURCE_DIR";
pub const ENV_DATA_DIR: &str = "MEDALLION_DATA_DIR";
pub const ENV_REPORT_PATH: &str = "MEDALLION_REPORT_PATH";
pub const ENV_TIMESTAMP_FORMAT: &str = "MEDALLION_TIMESTAMP_FORMAT";

/// File names of the three raw exports inside the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFiles {
    pub orders: String,
    pub order_items: String,
    pub customers: String,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            orders: "olist_orders_dataset.csv".to_string(),
            order_items: "olist_order_items_dataset.csv".to_string(),
            customers: "olist_customers_dataset.csv".to_string(),
        }
    }
}

/// Options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Directory holding the raw CSV exports
    pub source_dir: PathBuf,

    /// Base directory for `bronze/`, `silver/` and `gold/`
    pub data_dir: PathBuf,

    /// Where the run report is written
    pub report_path: PathBuf,

    /// `chrono` format of raw timestamps
    pub timestamp_format: String,

    pub sources: SourceFiles,

    /// Run every stage but keep outputs in memory
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source_data"),
            data_dir: PathBuf::from("data"),
            report_path: PathBuf::from("data/run_report.json"),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            sources: SourceFiles::default(),
            dry_run: false,
        }
    }
}

impl PipelineOptions {
    /// Defaults overlaid with `.env` and `MEDALLION_*` variables.
    pub fn from_env() -> Self {
        // The only place .env is loaded
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut options = Self::default();
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = set(ENV_SOURCE_DIR) {
            options.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = set(ENV_DATA_DIR) {
            options.report_path = PathBuf::from(&dir).join("run_report.json");
            options.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = set(ENV_REPORT_PATH) {
            options.report_path = PathBuf::from(path);
        }
        if let Some(format) = set(ENV_TIMESTAMP_FORMAT) {
            options.timestamp_format = format;
        }
        options
    }

    pub fn orders_path(&self) -> PathBuf {
        self.source_dir.join(&self.sources.orders)
    }

    pub fn order_items_path(&self) -> PathBuf {
        self.source_dir.join(&self.sources.order_items)
    }

    pub fn customers_path(&self) -> PathBuf {
        self.source_dir.join(&self.sources.customers)
    }

    pub fn with_source_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.source_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the data directory; the report follows unless set explicitly.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        if self.report_path == self.data_dir.join("run_report.json") {
            self.report_path = dir.as_ref().join("run_report.json");
        }
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_report_path(mut self, path: impl AsRef<Path>) -> Self {
        self.report_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
