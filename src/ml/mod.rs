//! Model training and prediction
//!
//! - [`gbm`]: gradient-boosted regression trees
//! - [`scaler`]: per-column standardization
//! - [`trainer`]: split, scale, fit, evaluate
//! - [`artifact`]: all-or-nothing persistence of a trained model
//! - [`predictor`]: aligned scoring with a run-wide uncertainty band

pub mod artifact;
pub mod gbm;
pub mod metrics;
pub mod predictor;
pub mod scaler;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use artifact::{ArtifactStore, TrainedArtifact, ARTIFACT_FILES};
pub use gbm::{GbmParams, GradientBoostedRegressor, TreeNode};
pub use metrics::TrainingMetrics;
pub use predictor::{PredictionService, PredictionTable};
pub use scaler::StandardScaler;
pub use trainer::{train_test_split, ModelTrainer};
