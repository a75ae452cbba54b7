//! Linear baseline - ridge regression over flattened windows (SmartCore)
//!
//! Each `(sequence_length, features)` window is flattened row-major and a
//! constant bias column is appended. One regressor is fitted per output.

use super::persistence::{self, FORMAT_VERSION, MODEL_FILE};
use super::{
    check_inputs, check_targets, holdout, mean_squared_error, FitOptions, History, SequenceModel,
};
use crate::error::ModelError;
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};
use std::path::Path;
use tracing::info;

const KIND: &str = "linear";

type Ridge = RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    /// L2 penalty; keeps the one-hot blocks (collinear with the bias) solvable
    pub alpha: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { alpha: 1e-3 }
    }
}

pub struct LinearBaseline {
    config: LinearConfig,
    input_shape: (usize, usize),
    output_size: usize,
    models: Vec<Ridge>,
}

/// On-disk form; `M` is `&[Ridge]` when writing and `Vec<Ridge>` when reading
#[derive(Serialize, Deserialize)]
struct SavedLinear<M> {
    version: String,
    kind: String,
    saved_at: i64,
    config: LinearConfig,
    input_shape: (usize, usize),
    output_size: usize,
    models: M,
}

impl LinearBaseline {
    pub fn is_fitted(&self) -> bool {
        self.models.len() == self.output_size
    }

    fn design_matrix(x: &Array3<f64>) -> Result<DenseMatrix<f64>, ModelError> {
        let rows: Vec<Vec<f64>> = x
            .outer_iter()
            .map(|window| window.iter().copied().chain(std::iter::once(1.0)).collect())
            .collect();
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        DenseMatrix::from_2d_array(&refs).map_err(|e| ModelError::Training(e.to_string()))
    }

    fn predict_scaled(&self, x: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
        let samples = x.len_of(Axis(0));
        let mut out = Array2::zeros((samples, self.output_size));
        if samples == 0 {
            return Ok(out);
        }
        let design = Self::design_matrix(x)?;
        for (k, model) in self.models.iter().enumerate() {
            let column = model
                .predict(&design)
                .map_err(|e| ModelError::Training(e.to_string()))?;
            for (i, value) in column.into_iter().enumerate() {
                out[[i, k]] = value;
            }
        }
        Ok(out)
    }
}

impl SequenceModel for LinearBaseline {
    type Config = LinearConfig;

    fn build(input_shape: (usize, usize), output_size: usize, config: &LinearConfig) -> Self {
        Self {
            config: config.clone(),
            input_shape,
            output_size,
            models: Vec::new(),
        }
    }

    fn input_shape(&self) -> (usize, usize) {
        self.input_shape
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn fit(
        &mut self,
        x: &Array3<f64>,
        y: &Array2<f64>,
        options: &FitOptions,
    ) -> Result<History, ModelError> {
        check_inputs(x, self.input_shape)?;
        check_targets(y, x.len_of(Axis(0)), self.output_size)?;
        let (train_x, train_y, validation) = holdout(x, y, options.validation_split)?;

        let design = Self::design_matrix(&train_x)?;
        let params = RidgeRegressionParameters::default()
            .with_alpha(self.config.alpha)
            .with_normalize(false);

        let mut models = Vec::with_capacity(self.output_size);
        for target in train_y.axis_iter(Axis(1)) {
            let target = target.to_vec();
            let model = Ridge::fit(&design, &target, params.clone())
                .map_err(|e| ModelError::Training(e.to_string()))?;
            models.push(model);
        }
        self.models = models;

        let mut history = History {
            best_epoch: Some(0),
            ..History::default()
        };
        history
            .loss
            .push(mean_squared_error(&self.predict_scaled(&train_x)?, &train_y));
        if let Some((vx, vy)) = &validation {
            history
                .val_loss
                .push(mean_squared_error(&self.predict_scaled(vx)?, vy));
        }
        history.learning_rate.push(0.0);

        info!(
            "✅ Linear baseline fitted on {} samples (loss {:.6})",
            train_x.len_of(Axis(0)),
            history.loss[0]
        );
        Ok(history)
    }

    fn predict(&self, x: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted("LinearBaseline"));
        }
        check_inputs(x, self.input_shape)?;
        self.predict_scaled(x)
    }

    fn save(&self, dir: &Path) -> Result<(), ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted("LinearBaseline"));
        }
        persistence::ensure_dir(dir)?;
        let saved = SavedLinear {
            version: FORMAT_VERSION.to_string(),
            kind: KIND.to_string(),
            saved_at: chrono::Utc::now().timestamp_millis(),
            config: self.config.clone(),
            input_shape: self.input_shape,
            output_size: self.output_size,
            models: self.models.as_slice(),
        };
        persistence::write_json(&dir.join(MODEL_FILE), &saved)
    }

    fn load(dir: &Path) -> Result<Self, ModelError> {
        let path = dir.join(MODEL_FILE);
        let saved: SavedLinear<Vec<Ridge>> = persistence::read_json(&path)?;
        if saved.kind != KIND {
            return Err(ModelError::Incompatible {
                path,
                reason: format!("expected a {KIND} model, found {:?}", saved.kind),
            });
        }
        if saved.models.len() != saved.output_size {
            return Err(ModelError::Incompatible {
                path,
                reason: format!(
                    "{} regressors for {} outputs",
                    saved.models.len(),
                    saved.output_size
                ),
            });
        }
        Ok(Self {
            config: saved.config,
            input_shape: saved.input_shape,
            output_size: saved.output_size,
            models: saved.models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Array3<f64>, Array2<f64>) {
        let x = Array3::from_shape_fn((40, 3, 2), |(i, t, f)| {
            ((i * 7919 + t * 104_729 + f * 1_299_709) % 1000) as f64 / 1000.0
        });
        let y = Array2::from_shape_fn((40, 1), |(i, _)| {
            0.3 * x[[i, 2, 0]] - 0.2 * x[[i, 0, 1]] + 0.1
        });
        (x, y)
    }

    #[test]
    fn fits_a_linear_target() {
        let (x, y) = linear_data();
        let mut model = LinearBaseline::build((3, 2), 1, &LinearConfig { alpha: 1e-8 });
        let options = FitOptions {
            validation_split: 0.25,
            ..FitOptions::default()
        };
        let history = model.fit(&x, &y, &options).unwrap();

        assert_eq!(history.epochs_run(), 1);
        assert_eq!(history.val_loss.len(), 1);
        assert!(history.loss[0] < 1e-6);
        assert!(history.val_loss[0] < 1e-4);
    }

    #[test]
    fn unfitted_predict_fails() {
        let model = LinearBaseline::build((3, 2), 1, &LinearConfig::default());
        let x = Array3::zeros((2, 3, 2));
        assert!(matches!(model.predict(&x), Err(ModelError::NotFitted(_))));
    }

    #[test]
    fn save_load_reproduces_predictions() {
        let (x, y) = linear_data();
        let mut model = LinearBaseline::build((3, 2), 1, &LinearConfig::default());
        model.fit(&x, &y, &FitOptions::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        let restored = LinearBaseline::load(dir.path()).unwrap();

        let before = model.predict(&x).unwrap();
        let after = restored.predict(&x).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(restored.input_shape(), (3, 2));
    }
}
