//! Run metadata, market analysis and the weekly summary report
//!
//! The report stage runs even when training or prediction failed, so the
//! generator reads whatever the results directory holds, including
//! predictions and metadata left by earlier runs.

pub mod analysis;
pub mod summary;


pub use analysis::{MarketAnalysis, MarketTrend, VolatilityLevel};
pub use summary::SummaryReport;

use crate::context::RunContext;
use crate::error::Result;
use crate::ml::TrainingMetrics;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `ml_output_metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_date: String,
    pub routes_analyzed: usize,
    #[serde(default)]
    pub model_metrics: Option<TrainingMetrics>,
    pub market_analysis: MarketAnalysis,
    /// False when predictions came from a model trained in an earlier run
    #[serde(default)]
    pub model_fresh: bool,
}

impl RunMetadata {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// What the orchestrator hands the report collaborator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportInput {
    /// File name under the reports directory
    pub output_name: String,
    /// Rendered per-stage outcome table
    pub outcome_table: String,
    pub model_fresh: bool,
}

/// Renders the run's report and returns where it was written
#[cfg_attr(test, mockall::automock)]
pub trait ReportGenerator: Send + Sync {
    fn generate(&self, ctx: &RunContext, input: &ReportInput) -> Result<PathBuf>;
}
