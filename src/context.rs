//! Per-run context handed to every pipeline component
//!
//! Carries resolved paths, the configuration, and the run identity. Nothing
//! in the pipeline reads the working directory or global state directly.

use crate::config::{Config, PathsConfig};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const PREDICTIONS_FILE: &str = "route_predictions.csv";
pub const METADATA_FILE: &str = "ml_output_metadata.json";

/// Resolved working directories
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub models_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RunPaths {
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self {
            data_dir: PathsConfig::expand(&paths.data_dir),
            results_dir: PathsConfig::expand(&paths.results_dir),
            models_dir: PathsConfig::expand(&paths.models_dir),
            reports_dir: PathsConfig::expand(&paths.reports_dir),
            logs_dir: PathsConfig::expand(&paths.logs_dir),
        }
    }

    /// All directories nested under one root
    pub fn under(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            results_dir: root.join("results"),
            models_dir: root.join("models"),
            reports_dir: root.join("reports"),
            logs_dir: root.join("logs"),
        }
    }

    /// Create output directories. The data directory is left alone.
    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [&self.results_dir, &self.models_dir, &self.reports_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Everything a stage needs to know about the current run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub paths: RunPaths,
    pub config: Config,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        let paths = RunPaths::from_config(&config.paths);
        Self::with_paths(config, paths)
    }

    pub fn with_paths(config: Config, paths: RunPaths) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            paths,
            config,
        }
    }

    /// Calendar date stamped on predictions and metrics
    pub fn run_date(&self) -> String {
        self.started_at.format("%Y-%m-%d").to_string()
    }

    pub fn rates_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.config.files.rates)
    }

    pub fn market_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.config.files.market)
    }

    pub fn sentiment_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.config.files.sentiment)
    }

    pub fn indicators_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.config.files.indicators)
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.paths.results_dir.join(PREDICTIONS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.paths.results_dir.join(METADATA_FILE)
    }

    /// Span that tags every log line of this run
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
