//! Trained artifact persistence
//!
//! An artifact generation is five JSON files in the models directory. A
//! save stages every file as a temporary in the same directory and only
//! renames them into place once all five serialized and wrote cleanly.
//! A load treats any missing file as "no model".

use super::gbm::GradientBoostedRegressor;
use super::metrics::TrainingMetrics;
use super::scaler::StandardScaler;
use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const MODEL_FILE: &str = "freight_gbm_model.json";
pub const SCALER_FILE: &str = "feature_scaler.json";
pub const FEATURES_FILE: &str = "available_features.json";
pub const IMPORTANCE_FILE: &str = "feature_importance.json";
pub const METRICS_FILE: &str = "training_metrics.json";

pub const ARTIFACT_FILES: [&str; 5] = [
    MODEL_FILE,
    SCALER_FILE,
    FEATURES_FILE,
    IMPORTANCE_FILE,
    METRICS_FILE,
];

/// Everything needed to reproduce predictions from one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    pub model: GradientBoostedRegressor,
    pub scaler: StandardScaler,
    /// Feature names in the column order the model was fitted on
    pub features: Vec<String>,
    pub importances: BTreeMap<String, f64>,
    pub metrics: TrainingMetrics,
}

impl TrainedArtifact {
    /// Features sorted by importance, largest first
    pub fn top_features(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .importances
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Reads and writes artifacts in a models directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact files not present on disk
    pub fn missing_files(&self) -> Vec<&'static str> {
        ARTIFACT_FILES
            .iter()
            .copied()
            .filter(|f| !self.dir.join(f).exists())
            .collect()
    }

    pub fn exists(&self) -> bool {
        self.missing_files().is_empty()
    }

    /// Replace the stored generation with `artifact`
    pub fn save(&self, artifact: &TrainedArtifact) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;

        let contents = [
            (MODEL_FILE, serde_json::to_string(&artifact.model)?),
            (SCALER_FILE, serde_json::to_string_pretty(&artifact.scaler)?),
            (FEATURES_FILE, serde_json::to_string_pretty(&artifact.features)?),
            (IMPORTANCE_FILE, serde_json::to_string_pretty(&artifact.importances)?),
            (METRICS_FILE, serde_json::to_string_pretty(&artifact.metrics)?),
        ];

        let mut staged = Vec::with_capacity(contents.len());
        for (name, body) in &contents {
            let mut tmp = NamedTempFile::new_in(&self.dir)?;
            tmp.write_all(body.as_bytes())?;
            tmp.flush()?;
            staged.push((*name, tmp));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (name, tmp) in staged {
            let path = self.dir.join(name);
            tmp.persist(&path).map_err(|e| e.error)?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        info!("Model artifact saved to {}", self.dir.display());
        Ok(written)
    }

    /// Load the stored generation
    pub fn load(&self) -> Result<TrainedArtifact> {
        let missing = self.missing_files();
        if !missing.is_empty() {
            return Err(PipelineError::ArtifactIncomplete(format!(
                "missing {} in {}",
                missing.join(", "),
                self.dir.display()
            )));
        }

        let artifact = TrainedArtifact {
            model: self.read_json(MODEL_FILE)?,
            scaler: self.read_json(SCALER_FILE)?,
            features: self.read_json(FEATURES_FILE)?,
            importances: self.read_json(IMPORTANCE_FILE)?,
            metrics: self.read_json(METRICS_FILE)?,
        };

        let width = artifact.features.len();
        if artifact.scaler.n_features() != width || artifact.model.n_features != width {
            return Err(PipelineError::ArtifactIncomplete(format!(
                "feature count mismatch: {} names, scaler {}, model {}",
                width,
                artifact.scaler.n_features(),
                artifact.model.n_features
            )));
        }

        debug!("Loaded model artifact with {} features", width);
        Ok(artifact)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = std::fs::read_to_string(self.dir.join(name))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
