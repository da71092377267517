//! Tests for training, persistence and prediction

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{FeatureConfig, ModelConfig};
    use crate::data::{Bundle, DataAggregator};
    use crate::error::PipelineError;
    use crate::features::{FeatureBuilder, FeatureTable};
    use crate::ml::metrics::{mean_absolute_error, r2_score, root_mean_squared_error};
    use crate::ml::predictor::{assemble, band_half_width, confidence_score};
    use crate::testing::{context_in, route, write_all_sources};
    use crate::types::{ConfidenceLevel, Trend};
    use tempfile::tempdir;

    fn small_config() -> ModelConfig {
        ModelConfig {
            n_estimators: 20,
            ..ModelConfig::default()
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, ((i * 7) % 5) as f64]).collect();
        let y = (0..40).map(|i| if i < 20 { -10.0 } else { 10.0 }).collect();
        (x, y)
    }

    fn two_route_bundle() -> Bundle {
        Bundle {
            rates: Some(vec![route("TD3C", 57589.0, 100.0), route("TC19", 26023.0, -50.0)]),
            ..Default::default()
        }
    }

    fn fixture_features() -> (Bundle, FeatureTable, Vec<f64>) {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        write_all_sources(&ctx);
        let bundle = DataAggregator::new(&ctx).load();
        let (table, target) = FeatureBuilder::new(FeatureConfig::default()).build(&bundle).unwrap();
        (bundle, table, target.unwrap())
    }

    // --- scaler ---

    #[test]
    fn test_scaler_standardizes_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows);

        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        assert_eq!(scaler.transform(&rows), vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_scaler_constant_column_keeps_unit_scale() {
        let scaler = StandardScaler::fit(&[vec![7.0], vec![7.0], vec![7.0]]);
        assert_eq!(scaler.scale, vec![1.0]);
        assert_eq!(scaler.transform_row(&[9.0]), vec![2.0]);
    }

    // --- gbm ---

    #[test]
    fn test_gbm_fits_step_function() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &GbmParams::default());

        assert_eq!(model.trees.len(), 100);
        assert!((model.predict_row(&[5.0, 0.0]) + 10.0).abs() < 1.0);
        assert!((model.predict_row(&[35.0, 0.0]) - 10.0).abs() < 1.0);
        assert!(model.trees.iter().all(|t| t.depth() <= 3));
    }

    #[test]
    fn test_gbm_importance_favours_signal() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &GbmParams::default());
        let importances = model.feature_importances();

        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_gbm_same_seed_same_model() {
        let (x, y) = step_data();
        let params = GbmParams::default();
        let a = GradientBoostedRegressor::fit(&x, &y, &params);
        let b = GradientBoostedRegressor::fit(&x, &y, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gbm_degenerate_inputs() {
        let empty = GradientBoostedRegressor::fit(&[], &[], &GbmParams::default());
        assert!(empty.trees.is_empty());
        assert_eq!(empty.predict_row(&[1.0]), 0.0);

        // No columns: every tree is a leaf and the model predicts the mean
        let x = vec![vec![], vec![]];
        let model = GradientBoostedRegressor::fit(&x, &[2.0, 4.0], &GbmParams::default());
        assert!((model.predict_row(&[]) - 3.0).abs() < 1e-9);
        assert_eq!(model.feature_importances(), Vec::<f64>::new());
    }

    #[test]
    fn test_tree_node_routes_by_threshold() {
        let tree = TreeNode::Split {
            feature: 1,
            threshold: 0.5,
            left: Box::new(TreeNode::Leaf { value: -1.0 }),
            right: Box::new(TreeNode::Leaf { value: 1.0 }),
        };
        assert_eq!(tree.predict(&[9.0, 0.5]), -1.0);
        assert_eq!(tree.predict(&[9.0, 0.6]), 1.0);
        // Out-of-range feature reads as 0
        assert_eq!(tree.predict(&[]), -1.0);
    }

    // --- metrics ---

    #[test]
    fn test_metrics_values() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.0, 2.0, 3.0, 6.0];

        assert_eq!(mean_absolute_error(&actual, &predicted), 0.5);
        assert_eq!(root_mean_squared_error(&actual, &predicted), 1.0);
        assert!((r2_score(&actual, &predicted) - (1.0 - 4.0 / 5.0)).abs() < 1e-12);
        assert_eq!(r2_score(&actual, &actual), 1.0);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[5.0], &[5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 6.0]), 0.0);
    }

    // --- split ---

    #[test]
    fn test_split_partition_sizes() {
        assert_eq!(train_test_split(0, 0.2, 42), (vec![], vec![]));
        assert_eq!(train_test_split(1, 0.2, 42), (vec![0], vec![0]));

        let (train, test) = train_test_split(2, 0.2, 42);
        assert_eq!((train.len(), test.len()), (1, 1));

        let (train, test) = train_test_split(10, 0.2, 42);
        assert_eq!((train.len(), test.len()), (8, 2));

        let (train, test) = train_test_split(3, 0.99, 42);
        assert_eq!((train.len(), test.len()), (1, 2));
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let a = train_test_split(22, 0.2, 42);
        let b = train_test_split(22, 0.2, 42);
        assert_eq!(a, b);

        let (train, test) = a;
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..22).collect::<Vec<_>>());
    }

    // --- trainer + artifact ---

    #[test]
    fn test_train_empty_table_returns_false() {
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");

        assert!(!trainer.train(&FeatureTable::default(), &[]));
        assert!(trainer.store().missing_files().len() == ARTIFACT_FILES.len());
    }

    #[test]
    fn test_train_mismatched_target_is_insufficient() {
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");
        let (_, table, _) = fixture_features();

        match trainer.fit(&table, &[1.0]) {
            Err(PipelineError::TrainingDataInsufficient(_)) => {}
            other => panic!("expected insufficient data, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let (_, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");

        let a = trainer.fit(&table, &target).unwrap();
        let b = trainer.fit(&table, &target).unwrap();

        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.model, b.model);
        assert_eq!(a.metrics.data_points, 4);
        assert_eq!(a.metrics.features, table.width());
        assert_eq!(a.metrics.training_date, "2025-03-17");
    }

    #[test]
    fn test_train_persists_all_files() {
        let (_, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        let trainer = ModelTrainer::new(small_config(), store.clone(), "2025-03-17");

        assert!(trainer.train(&table, &target));
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.features, table.names());
        assert_eq!(loaded.importances.len(), table.width());
        assert_eq!(loaded.metrics.data_points, 4);
    }

    #[test]
    fn test_incomplete_artifact_is_no_model() {
        let (_, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let trainer = ModelTrainer::new(small_config(), store.clone(), "2025-03-17");
        trainer.train_and_save(&table, &target).unwrap();

        std::fs::remove_file(dir.path().join(artifact::SCALER_FILE)).unwrap();

        assert_eq!(store.missing_files(), vec![artifact::SCALER_FILE]);
        match store.load() {
            Err(PipelineError::ArtifactIncomplete(msg)) => assert!(msg.contains(artifact::SCALER_FILE)),
            other => panic!("expected incomplete artifact, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_top_features_sorted() {
        let (_, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");
        let artifact = trainer.fit(&table, &target).unwrap();

        let top = artifact.top_features(3);
        assert_eq!(top.len(), 3);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    // --- prediction ---

    #[test]
    fn test_two_route_example() {
        let bundle = two_route_bundle();
        let (table, target) = FeatureBuilder::new(FeatureConfig::default()).build(&bundle).unwrap();
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");
        let artifact = trainer.fit(&table, &target.unwrap()).unwrap();

        let mut service = PredictionService::new(
            FeatureBuilder::new(FeatureConfig::default()),
            ArtifactStore::new(dir.path()),
            "2025-03-17",
        )
        .with_artifact(artifact);
        let predictions = service.predict(&bundle).unwrap();

        assert_eq!(predictions.len(), 2);
        let values: Vec<f64> = predictions.iter().map(|p| p.predicted_change).collect();
        assert!(values[0] >= values[1]);
        for p in predictions.iter() {
            assert!(p.description.is_some());
            assert!(p.current_tce.is_some());
            assert_eq!(p.prediction_date, "2025-03-17");
            assert!((0.0..=100.0).contains(&p.confidence));
        }
    }

    #[test]
    fn test_prediction_band_invariants() {
        let (bundle, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");
        trainer.train_and_save(&table, &target).unwrap();

        let mut service = PredictionService::new(
            FeatureBuilder::new(FeatureConfig::default()),
            ArtifactStore::new(dir.path()),
            "2025-03-17",
        );
        let predictions = service.predict(&bundle).unwrap();

        assert_eq!(predictions.len(), 4);
        let width = predictions.predictions[0].band_width();
        for p in predictions.iter() {
            assert!(p.lower_bound <= p.predicted_change);
            assert!(p.predicted_change <= p.upper_bound);
            assert!((p.band_width() - width).abs() < 1e-9);
            assert_eq!(p.trend, Trend::from_change(p.predicted_change));
            assert_eq!(p.confidence_level, ConfidenceLevel::from_score(p.confidence));
        }
        assert!(predictions
            .predictions
            .windows(2)
            .all(|w| w[0].predicted_change >= w[1].predicted_change));
    }

    #[test]
    fn test_missing_artifact_feature_reads_zero() {
        let (_, table, target) = fixture_features();
        let dir = tempdir().unwrap();
        let trainer = ModelTrainer::new(small_config(), ArtifactStore::new(dir.path()), "2025-03-17");
        let artifact = trainer.fit(&table, &target).unwrap();

        // Only the rate table is available now; market, sentiment and macro
        // columns the model was trained on are absent
        let bundle = Bundle {
            rates: Some(vec![
                route("TD3C", 57589.0, 698.0),
                route("TD20", 32492.0, 125.0),
                route("TC19", 26023.0, 55.0),
                route("TC18", 20728.0, -2818.0),
                route("TD99", 10000.0, 0.0),
            ]),
            ..Default::default()
        };
        let mut service = PredictionService::new(
            FeatureBuilder::new(FeatureConfig::default()),
            ArtifactStore::new(dir.path()),
            "2025-03-17",
        )
        .with_artifact(artifact);

        let predictions = service.try_predict(&bundle).unwrap();
        assert_eq!(predictions.len(), 5);
    }

    #[test]
    fn test_predict_without_model_is_none() {
        let dir = tempdir().unwrap();
        let mut service = PredictionService::new(
            FeatureBuilder::new(FeatureConfig::default()),
            ArtifactStore::new(dir.path()),
            "2025-03-17",
        );

        assert!(service.predict(&two_route_bundle()).is_none());
        assert!(matches!(
            service.try_predict(&two_route_bundle()),
            Err(PipelineError::ArtifactIncomplete(_))
        ));
    }

    #[test]
    fn test_band_half_width() {
        assert_eq!(band_half_width(&[]), 0.0);
        assert_eq!(band_half_width(&[42.0]), 0.0);
        // Population std of [-1, 1] is 1
        assert!((band_half_width(&[-1.0, 1.0]) - 1.96).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence_score(0.0, 0.0), 100.0);
        assert_eq!(confidence_score(0.0, 1000.0), 0.0);
        assert!((confidence_score(100.0, 100.0) - 75.0).abs() < 1e-12);
        assert!((confidence_score(-100.0, 100.0) - 75.0).abs() < 1e-12);
        for p in [-1e9, -5.0, 0.0, 3.5, 1e12] {
            for w in [0.0, 1.0, 250.0, 1e6] {
                let c = confidence_score(p, w);
                assert!((0.0..=100.0).contains(&c), "p={} w={} c={}", p, w, c);
            }
        }
    }

    #[test]
    fn test_assemble_sorts_and_derives_fields() {
        let routes = vec![route("TD3C", 1000.0, 5.0), route("TC19", 2000.0, -5.0), route("TD7", 3000.0, 0.0)];
        let predictions = assemble(&routes, &[-20.0, 40.0, 0.0], "2025-03-17");

        let order: Vec<&str> = predictions.iter().map(|p| p.route.as_str()).collect();
        assert_eq!(order, vec!["TC19", "TD7", "TD3C"]);
        assert_eq!(predictions[0].predicted_tce, Some(2040.0));
        assert_eq!(predictions[0].trend, Trend::Improving);
        // Zero is not an improvement
        assert_eq!(predictions[1].trend, Trend::Declining);
        assert_eq!(predictions[2].last_change, Some(5.0));
    }

    #[test]
    fn test_prediction_table_csv() {
        let routes = vec![route("TD3C", 1000.0, 5.0), route("TC19", 2000.0, -5.0)];
        let mut rows = assemble(&routes, &[10.0, -10.0], "2025-03-17");
        rows[1].description = None;
        rows[1].current_tce = None;
        rows[1].predicted_tce = None;
        let table = PredictionTable { predictions: rows };

        let dir = tempdir().unwrap();
        let path = dir.path().join("results").join("route_predictions.csv");
        table.write_csv(&path).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "Route,Predicted_Change,Lower_Bound,Upper_Bound,Confidence,Confidence_Level,Trend,Prediction_Date,Description,Current_TCE,Predicted_TCE,Last_Change"
        ));

        let read = PredictionTable::read_csv(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read.predictions[0].route, "TD3C");
        assert_eq!(read.predictions[0].confidence_level, table.predictions[0].confidence_level);
        assert_eq!(read.predictions[1].current_tce, None);
        assert_eq!(read.improving_count(), 1);
    }
}
