//! Route predictions from a trained artifact
//!
//! Rebuilds features for the current routes, aligns them to the artifact's
//! feature list, and scores them. Uncertainty is a single band shared by
//! every route in the run: 1.96 population standard deviations of this
//! run's predictions.
//!
//! Usage:
//! ```ignore
//! let mut service = PredictionService::from_context(&ctx);
//! let table = service.predict(&bundle);
//! ```

use super::artifact::{ArtifactStore, TrainedArtifact};
use crate::context::RunContext;
use crate::data::{tables, Bundle};
use crate::error::Result;
use crate::features::FeatureBuilder;
use crate::types::{ConfidenceLevel, Prediction, Route, Trend};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// z-score for the two-sided 95% band
pub const BAND_Z: f64 = 1.96;

/// Offset keeping the confidence ratio finite near a zero prediction
pub const CONFIDENCE_OFFSET: f64 = 100.0;

/// Half-width of the shared band: `BAND_Z` population standard deviations
pub fn band_half_width(predictions: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let n = predictions.len() as f64;
    let mean = predictions.iter().sum::<f64>() / n;
    let var = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    BAND_Z * var.sqrt()
}

/// `100 × (1 − width / (2 × (|p| + 100)))`, clipped to [0, 100].
///
/// The band is run-wide, so this reflects how large the prediction is
/// relative to the spread of all predictions rather than a per-route
/// interval.
pub fn confidence_score(predicted: f64, band_width: f64) -> f64 {
    let ratio = band_width / (2.0 * (predicted.abs() + CONFIDENCE_OFFSET));
    let score = 100.0 * (1.0 - ratio);
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Attach bands, confidence and route context, sorted by predicted change
/// descending
pub fn assemble(routes: &[Route], predicted: &[f64], prediction_date: &str) -> Vec<Prediction> {
    let half = band_half_width(predicted);

    let mut out: Vec<Prediction> = routes
        .iter()
        .zip(predicted)
        .map(|(route, &p)| {
            let confidence = confidence_score(p, 2.0 * half);
            Prediction {
                route: route.code.clone(),
                predicted_change: p,
                lower_bound: p - half,
                upper_bound: p + half,
                confidence,
                confidence_level: ConfidenceLevel::from_score(confidence),
                trend: Trend::from_change(p),
                prediction_date: prediction_date.to_string(),
                description: Some(route.description.clone()).filter(|d| !d.is_empty()),
                current_tce: route.current_tce,
                predicted_tce: route.current_tce.map(|tce| tce + p),
                last_change: route.last_change,
            }
        })
        .collect();

    out.sort_by(|a, b| b.predicted_change.total_cmp(&a.predicted_change));
    out
}

/// Predictions for one run, sorted by predicted change descending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTable {
    pub predictions: Vec<Prediction>,
}

impl PredictionTable {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter()
    }

    pub fn improving_count(&self) -> usize {
        self.iter().filter(|p| p.trend == Trend::Improving).count()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        tables::write_rows(path, &self.predictions)?;
        info!("Saved {} predictions to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a table written by an earlier run
    pub fn read_csv(path: &Path) -> Result<Self> {
        Ok(Self {
            predictions: tables::read_rows(path)?,
        })
    }
}

/// Scores current routes against a trained artifact
#[derive(Debug, Clone)]
pub struct PredictionService {
    builder: FeatureBuilder,
    store: ArtifactStore,
    artifact: Option<TrainedArtifact>,
    prediction_date: String,
}

impl PredictionService {
    pub fn new(builder: FeatureBuilder, store: ArtifactStore, prediction_date: impl Into<String>) -> Self {
        Self {
            builder,
            store,
            artifact: None,
            prediction_date: prediction_date.into(),
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        Self::new(
            FeatureBuilder::new(ctx.config.features.clone()),
            ArtifactStore::new(&ctx.paths.models_dir),
            ctx.run_date(),
        )
    }

    /// Use an artifact already in memory instead of loading from disk
    pub fn with_artifact(mut self, artifact: TrainedArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn artifact(&self) -> Option<&TrainedArtifact> {
        self.artifact.as_ref()
    }

    /// Predict for every route in the bundle; `None` when no model is
    /// available or the routes cannot be read
    pub fn predict(&mut self, bundle: &Bundle) -> Option<PredictionTable> {
        match self.try_predict(bundle) {
            Ok(table) => Some(table),
            Err(e) => {
                error!("Prediction failed: {}", e);
                None
            }
        }
    }

    pub fn try_predict(&mut self, bundle: &Bundle) -> Result<PredictionTable> {
        if self.artifact.is_none() {
            self.artifact = Some(self.store.load()?);
            info!("Loaded model artifact from {}", self.store.dir().display());
        }
        let Some(artifact) = self.artifact.as_ref() else {
            return Ok(PredictionTable::default());
        };

        let routes = bundle.routes()?;
        let (features, _) = self.builder.build(bundle)?;

        let (aligned, alignment) = features.align_to(&artifact.features);
        if !alignment.filled.is_empty() {
            warn!(
                "{} model features missing from current data, filled with 0: {}",
                alignment.filled.len(),
                alignment.filled.join(", ")
            );
        }
        if !alignment.dropped.is_empty() {
            debug!("Dropped features unknown to the model: {}", alignment.dropped.join(", "));
        }

        let scaled = artifact.scaler.transform(&aligned.matrix());
        let predicted = artifact.model.predict(&scaled);

        let table = PredictionTable {
            predictions: assemble(routes, &predicted, &self.prediction_date),
        };
        info!(
            "Predicted {} routes, {} improving",
            table.len(),
            table.improving_count()
        );
        Ok(table)
    }
}
