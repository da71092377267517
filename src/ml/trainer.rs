//! Model training
//!
//! Split, scale, fit, evaluate, persist. Training never panics on bad
//! input; an empty or mismatched table is reported as insufficient data.

use super::artifact::{ArtifactStore, TrainedArtifact};
use super::gbm::{GbmParams, GradientBoostedRegressor};
use super::metrics::TrainingMetrics;
use super::scaler::StandardScaler;
use crate::config::ModelConfig;
use crate::context::RunContext;
use crate::error::{PipelineError, Result};
use crate::features::FeatureTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{error, info, warn};

/// Seeded shuffle split into `(train, test)` row indices.
///
/// With two or more rows each partition gets at least one row. A single
/// row is used for both.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    match n {
        0 => return (Vec::new(), Vec::new()),
        1 => return (vec![0], vec![0]),
        _ => {}
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);
    (train, indices)
}

fn select(rows: &[Vec<f64>], idx: &[usize]) -> Vec<Vec<f64>> {
    idx.iter().map(|&i| rows[i].clone()).collect()
}

/// Fits and persists gradient-boosted models
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelConfig,
    store: ArtifactStore,
    training_date: String,
}

impl ModelTrainer {
    pub fn new(config: ModelConfig, store: ArtifactStore, training_date: impl Into<String>) -> Self {
        Self {
            config,
            store,
            training_date: training_date.into(),
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        Self::new(
            ctx.config.model.clone(),
            ArtifactStore::new(&ctx.paths.models_dir),
            ctx.run_date(),
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Train and persist. Returns whether a new artifact was saved.
    pub fn train(&self, features: &FeatureTable, target: &[f64]) -> bool {
        match self.train_and_save(features, target) {
            Ok(_) => true,
            Err(e @ PipelineError::TrainingDataInsufficient(_)) => {
                warn!("Training skipped: {}", e);
                false
            }
            Err(e) => {
                error!("Training failed: {}", e);
                false
            }
        }
    }

    /// Train, persist, and hand back the artifact for reuse in this run
    pub fn train_and_save(&self, features: &FeatureTable, target: &[f64]) -> Result<TrainedArtifact> {
        let artifact = self.fit(features, target)?;
        self.store.save(&artifact)?;
        Ok(artifact)
    }

    /// Fit without touching disk
    pub fn fit(&self, features: &FeatureTable, target: &[f64]) -> Result<TrainedArtifact> {
        if features.is_empty() {
            return Err(PipelineError::TrainingDataInsufficient("no training rows".into()));
        }
        if features.len() != target.len() {
            return Err(PipelineError::TrainingDataInsufficient(format!(
                "{} feature rows but {} target values",
                features.len(),
                target.len()
            )));
        }

        // Route codes never enter the matrix
        let rows = features.matrix();
        let n = rows.len();
        let (train_idx, test_idx) = train_test_split(n, self.config.test_fraction, self.config.seed);
        info!(
            "Training on {} rows, evaluating on {} ({} features)",
            train_idx.len(),
            test_idx.len(),
            features.width()
        );

        let x_train = select(&rows, &train_idx);
        let y_train: Vec<f64> = train_idx.iter().map(|&i| target[i]).collect();
        let x_test = select(&rows, &test_idx);
        let y_test: Vec<f64> = test_idx.iter().map(|&i| target[i]).collect();

        let scaler = StandardScaler::fit(&x_train);
        let model = GradientBoostedRegressor::fit(
            &scaler.transform(&x_train),
            &y_train,
            &GbmParams::from(&self.config),
        );

        let y_pred = model.predict(&scaler.transform(&x_test));
        let metrics = TrainingMetrics::evaluate(&y_test, &y_pred, self.training_date.clone(), n, features.width());

        let importances = features
            .names()
            .iter()
            .cloned()
            .zip(model.feature_importances())
            .collect();

        info!(
            "Model trained: MAE={:.2}, RMSE={:.2}, R2={:.2}",
            metrics.mae, metrics.rmse, metrics.r2
        );

        Ok(TrainedArtifact {
            model,
            scaler,
            features: features.names().to_vec(),
            importances,
            metrics,
        })
    }
}
