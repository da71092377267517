//! Gradient-boosted regression trees
//!
//! Squared-error boosting: each round fits a depth-limited regression tree
//! to the current residuals on a seeded row/column subsample and adds it
//! with shrinkage. Split search scans every midpoint between distinct
//! sorted values and keeps the largest reduction in squared error.

use crate::config::ModelConfig;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Reductions at or below this share of a node's squared residual mass
/// count as no improvement
const MIN_RELATIVE_GAIN: f64 = 1e-9;

/// Boosting hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl From<&ModelConfig> for GbmParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            subsample: config.subsample,
            colsample: config.colsample,
            min_samples_leaf: config.min_samples_leaf.max(1),
            seed: config.seed,
        }
    }
}

impl Default for GbmParams {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    pub base_score: f64,
    pub learning_rate: f64,
    pub n_features: usize,
    pub trees: Vec<TreeNode>,
    /// Total squared-error reduction credited to each feature
    pub gains: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeFit<'a> {
    x: &'a [Vec<f64>],
    residuals: &'a [f64],
    features: &'a [usize],
    params: &'a GbmParams,
    gains: &'a mut [f64],
}

impl GradientBoostedRegressor {
    /// Fit on `x` (one row per sample) against `y`
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &GbmParams) -> Self {
        let n = x.len().min(y.len());
        let n_features = x.first().map_or(0, |r| r.len());
        let mut model = Self {
            base_score: if n > 0 { y[..n].iter().sum::<f64>() / n as f64 } else { 0.0 },
            learning_rate: params.learning_rate,
            n_features,
            trees: Vec::with_capacity(params.n_estimators),
            gains: vec![0.0; n_features],
        };
        if n == 0 {
            return model;
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut predictions = vec![model.base_score; n];
        let n_rows = sample_size(n, params.subsample);
        let n_cols = sample_size(n_features, params.colsample);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = (0..n).map(|i| y[i] - predictions[i]).collect();

            let mut rows = index::sample(&mut rng, n, n_rows).into_vec();
            rows.sort_unstable();
            let mut features = if n_features > 0 {
                index::sample(&mut rng, n_features, n_cols).into_vec()
            } else {
                Vec::new()
            };
            features.sort_unstable();

            let mut fit = TreeFit {
                x,
                residuals: &residuals,
                features: &features,
                params,
                gains: &mut model.gains,
            };
            let tree = fit.build(&rows, 0);

            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += params.learning_rate * tree.predict(&x[i]);
            }
            model.trees.push(tree);
        }

        model
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(row))
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Gain-based importances normalized to sum to 1 (all zero when no
    /// tree ever split)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.gains.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.gains.len()];
        }
        self.gains.iter().map(|g| g / total).collect()
    }
}

fn sample_size(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((n as f64 * fraction).round() as usize).clamp(1, n)
}

impl TreeFit<'_> {
    fn build(&mut self, rows: &[usize], depth: usize) -> TreeNode {
        let value = rows.iter().map(|&i| self.residuals[i]).sum::<f64>() / rows.len() as f64;

        if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_samples_leaf {
            return TreeNode::Leaf { value };
        }

        let Some(best) = self.best_split(rows) else {
            return TreeNode::Leaf { value };
        };

        self.gains[best.feature] += best.gain;

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let total: f64 = rows.iter().map(|&i| self.residuals[i]).sum();
        let parent = total * total / n as f64;
        let min_gain = MIN_RELATIVE_GAIN * rows.iter().map(|&i| self.residuals[i].powi(2)).sum::<f64>();

        let mut best: Option<SplitCandidate> = None;
        for &feature in self.features {
            let mut sorted: Vec<(f64, f64)> = rows
                .iter()
                .map(|&i| (self.x[i][feature], self.residuals[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += sorted[k - 1].1;
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let (lo, hi) = (sorted[k - 1].0, sorted[k].0);
                if lo == hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64 - parent;
                let better = match &best {
                    Some(b) => gain > b.gain,
                    None => gain > min_gain,
                };
                if better {
                    let mid = (lo + hi) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: if mid < hi { mid } else { lo },
                        gain,
                    });
                }
            }
        }
        best
    }
}
