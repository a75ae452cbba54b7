//! Integration tests for the model lifecycle

mod common;

#[cfg(test)]
mod tests {
    use super::common::{ad_csv, replace_field};
    use adpricing::data::Table;
    use adpricing::error::ModelError;
    use adpricing::evaluation::evaluate_model;
    use adpricing::model::persistence::{MODEL_FILE, SCALERS_FILE};
    use adpricing::model::{
        AdPricingModel, FitOptions, LinearBaseline, LinearConfig, LstmConfig, LstmRegressor,
    };
    use adpricing::preprocessing::{prepare, PipelineParams, PreparedData, UnknownCategory};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prepared(rows: usize, sequence_length: usize) -> PreparedData {
        prepared_from(&ad_csv(rows), sequence_length)
    }

    fn prepared_from(csv: &str, sequence_length: usize) -> PreparedData {
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        let params = PipelineParams {
            categorical_columns: vec!["platform".to_string(), "format".to_string()],
            numeric_columns: vec![
                "bid_amount".to_string(),
                "clicks".to_string(),
                "spend".to_string(),
            ],
            target_column: "bid_amount".to_string(),
            sequence_length,
            train_ratio: 0.8,
            unknown_category: UnknownCategory::Ignore,
        };
        prepare(&table, &params).unwrap()
    }

    fn small_lstm() -> LstmConfig {
        LstmConfig {
            hidden_size: 6,
            learning_rate: 0.01,
            ..LstmConfig::default()
        }
    }

    fn quick_fit() -> FitOptions {
        FitOptions {
            epochs: 4,
            batch_size: 8,
            ..FitOptions::default()
        }
    }

    // ============================================================================
    // LSTM lifecycle
    // ============================================================================

    #[test]
    fn test_predict_before_training_is_not_fitted() {
        let data = prepared(40, 4);
        let model = AdPricingModel::new(data.input_shape(), 1);

        assert!(!model.is_fitted());
        assert!(matches!(
            model.predict(&data.split.test_features),
            Err(ModelError::NotFitted(_))
        ));
    }

    #[test]
    fn test_lstm_save_load_round_trip() {
        let data = prepared(50, 4);
        let split = &data.split;
        let mut model =
            AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &small_lstm())
                .with_feature_names(data.matrix.columns.clone());
        let history = model
            .train(&split.train_features, &split.train_labels, &quick_fit())
            .unwrap();
        assert_eq!(history.epochs_run(), 4);

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        assert!(dir.path().join(MODEL_FILE).exists());
        assert!(dir.path().join(SCALERS_FILE).exists());

        let restored = AdPricingModel::<LstmRegressor>::load(dir.path()).unwrap();
        assert_eq!(restored.input_shape(), data.input_shape());
        assert_eq!(restored.feature_names(), data.matrix.columns.as_slice());

        let before = model.predict(&split.test_features).unwrap();
        let after = restored.predict(&split.test_features).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_missing_scaler_sidecar_is_an_error() {
        let data = prepared(40, 4);
        let split = &data.split;
        let mut model =
            AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &small_lstm());
        model
            .train(&split.train_features, &split.train_labels, &quick_fit())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(SCALERS_FILE)).unwrap();

        assert!(AdPricingModel::<LstmRegressor>::load(dir.path()).is_err());
    }

    #[test]
    fn test_early_stopping_on_flat_validation_loss() {
        let data = prepared(60, 4);
        let split = &data.split;
        let config = LstmConfig {
            learning_rate: 0.0,
            ..small_lstm()
        };
        let options = FitOptions {
            epochs: 50,
            early_stopping_patience: 3,
            lr_decay_patience: 100,
            ..FitOptions::default()
        };

        let mut model = AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &config);
        let history = model
            .train(&split.train_features, &split.train_labels, &options)
            .unwrap();

        assert_eq!(history.stopped_epoch, Some(3));
        assert_eq!(history.epochs_run(), 4);
        assert_eq!(history.best_epoch, Some(0));
        assert_eq!(history.val_loss.len(), 4);
    }

    #[test]
    fn test_learning_rate_never_drops_below_minimum() {
        let data = prepared(60, 4);
        let split = &data.split;
        let config = LstmConfig {
            learning_rate: 0.05,
            ..small_lstm()
        };
        let options = FitOptions {
            epochs: 12,
            early_stopping_patience: 100,
            lr_decay_factor: 0.2,
            lr_decay_patience: 1,
            min_learning_rate: 0.04,
            ..FitOptions::default()
        };

        let mut model = AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &config);
        let history = model
            .train(&split.train_features, &split.train_labels, &options)
            .unwrap();

        assert_eq!(history.stopped_epoch, None);
        assert_eq!(history.learning_rate.len(), 12);
        assert!(history
            .learning_rate
            .iter()
            .all(|&lr| (0.04..=0.05).contains(&lr)));
    }

    #[test]
    fn test_category_first_seen_in_test_rows_trains() {
        // TikTok only appears in the last six days, after every training window
        let csv = replace_field(&ad_csv(60), 2, |row, platform| {
            if row >= 54 {
                "TikTok".to_string()
            } else {
                platform.to_string()
            }
        });
        let data = prepared_from(&csv, 4);
        let split = &data.split;
        let tiktok = data.matrix.column_index("platform_TikTok").unwrap();
        assert!(split
            .train_features
            .slice(ndarray::s![.., .., tiktok])
            .iter()
            .all(|&v| v == 0.0));

        let mut model =
            AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &small_lstm())
                .with_feature_names(data.matrix.columns.clone());
        model
            .train(&split.train_features, &split.train_labels, &quick_fit())
            .unwrap();

        let predictions = model.predict(&split.test_features).unwrap();
        assert_eq!(predictions.nrows(), split.test_len());
        assert!(predictions.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_single_valued_category_trains() {
        let csv = replace_field(&ad_csv(50), 3, |_, _| "video".to_string());
        let data = prepared_from(&csv, 4);
        let split = &data.split;
        assert_eq!(data.pipeline.encoder.blocks()[1].values, vec!["video"]);

        for kind in ["lstm", "linear"] {
            let history = if kind == "lstm" {
                AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &small_lstm())
                    .train(&split.train_features, &split.train_labels, &quick_fit())
            } else {
                AdPricingModel::<LinearBaseline>::with_config(
                    data.input_shape(),
                    1,
                    &LinearConfig::default(),
                )
                .train(&split.train_features, &split.train_labels, &quick_fit())
            };
            assert!(history.is_ok(), "{} failed: {:?}", kind, history.err());
        }
    }

    #[test]
    fn test_importance_is_reproducible_with_a_seed() {
        let data = prepared(50, 4);
        let split = &data.split;
        let mut model =
            AdPricingModel::<LstmRegressor>::with_config(data.input_shape(), 1, &small_lstm());
        model
            .train(&split.train_features, &split.train_labels, &quick_fit())
            .unwrap();

        let first = model
            .feature_importance(&split.test_features, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let second = model
            .feature_importance(&split.test_features, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(first.len(), data.matrix.ncols());
        assert_eq!(first, second);
        assert!(first.iter().all(|s| s.is_finite() && *s >= 0.0));
    }

    // ============================================================================
    // Linear baseline
    // ============================================================================

    #[test]
    fn test_linear_baseline_round_trip_and_metrics() {
        let data = prepared(120, 3);
        let split = &data.split;
        let mut model = AdPricingModel::<LinearBaseline>::with_config(
            data.input_shape(),
            1,
            &LinearConfig::default(),
        );
        let history = model
            .train(&split.train_features, &split.train_labels, &FitOptions::default())
            .unwrap();
        assert_eq!(history.epochs_run(), 1);

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        let restored = AdPricingModel::<LinearBaseline>::load(dir.path()).unwrap();

        let before = model.predict(&split.test_features).unwrap();
        let after = restored.predict(&split.test_features).unwrap();
        assert_eq!(before, after);

        let y_pred = data.target_inverse(&after.column(0).to_vec()).unwrap();
        let y_true = data
            .target_inverse(&split.test_labels.column(0).to_vec())
            .unwrap();
        let metrics = evaluate_model(&y_true, &y_pred).unwrap();
        assert!(metrics.rmse.is_finite());
        assert!((metrics.rmse * metrics.rmse - metrics.mse).abs() < 1e-9);
    }

    #[test]
    fn test_loading_the_wrong_kind_is_rejected() {
        let data = prepared(120, 3);
        let split = &data.split;
        let mut model = AdPricingModel::<LinearBaseline>::with_config(
            data.input_shape(),
            1,
            &LinearConfig::default(),
        );
        model
            .train(&split.train_features, &split.train_labels, &FitOptions::default())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        assert!(AdPricingModel::<LstmRegressor>::load(dir.path()).is_err());
    }
}
