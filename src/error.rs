//! Error types for the forecasting pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A mandatory input is missing or unusable. Aborts the run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An optional source is missing or its fetch gave up.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Insufficient training data: {0}")]
    TrainingDataInsufficient(String),

    /// One or more of the five artifact files is missing.
    #[error("Model artifact incomplete: {0}")]
    ArtifactIncomplete(String),

    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether this error ends the run with a failure status.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::ReportGeneration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
