//! Model - trainable sequence regressors and the lifecycle wrapper
//!
//! The network itself is a capability behind [`SequenceModel`]: anything
//! that maps `(samples, sequence_length, features)` to `(samples, outputs)`
//! and can be fitted, evaluated and persisted plugs into
//! [`AdPricingModel`].
//!
//! - `LstmRegressor`: Burn LSTM layer and dense head trained with Adam
//! - `LinearBaseline`: ridge regression over flattened windows (SmartCore)

pub mod callbacks;
pub mod linear;
pub mod lstm;
pub mod persistence;
pub mod wrapper;

pub use callbacks::{EarlyStopping, ReduceLrOnPlateau, StopSignal};
pub use linear::{LinearBaseline, LinearConfig};
pub use lstm::{LstmConfig, LstmRegressor};
pub use wrapper::AdPricingModel;

use crate::error::ModelError;
use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Training knobs shared by every model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of samples (taken from the end, unshuffled) held out for validation
    pub validation_split: f64,
    /// Epochs without validation improvement before stopping
    pub early_stopping_patience: usize,
    /// Roll back to the best epoch's weights when training ends
    pub restore_best_weights: bool,
    /// Multiplier applied to the learning rate on a plateau
    pub lr_decay_factor: f64,
    /// Epochs without improvement before the learning rate is reduced
    pub lr_decay_patience: usize,
    /// Floor for the learning rate
    pub min_learning_rate: f64,
    /// Seed for batch shuffling
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 200,
            batch_size: 32,
            validation_split: 0.2,
            early_stopping_patience: 20,
            restore_best_weights: true,
            lr_decay_factor: 0.2,
            lr_decay_patience: 10,
            min_learning_rate: 1e-4,
            seed: 42,
        }
    }
}

/// Per-epoch training record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub learning_rate: Vec<f64>,
    /// Epoch at which early stopping fired
    pub stopped_epoch: Option<usize>,
    /// Epoch whose weights were kept
    pub best_epoch: Option<usize>,
}

impl History {
    pub fn epochs_run(&self) -> usize {
        self.loss.len()
    }
}

/// Loss (MSE) and metric (MAE), both in the space the model was fed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub metric: f64,
}

/// Black-box trainable sequence regressor.
pub trait SequenceModel: Sized {
    type Config: Clone + Default;

    /// Untrained model for inputs of `(sequence_length, features)`.
    fn build(input_shape: (usize, usize), output_size: usize, config: &Self::Config) -> Self;

    fn input_shape(&self) -> (usize, usize);

    fn output_size(&self) -> usize;

    fn fit(
        &mut self,
        x: &Array3<f64>,
        y: &Array2<f64>,
        options: &FitOptions,
    ) -> Result<History, ModelError>;

    fn predict(&self, x: &Array3<f64>) -> Result<Array2<f64>, ModelError>;

    fn evaluate(&self, x: &Array3<f64>, y: &Array2<f64>) -> Result<Evaluation, ModelError> {
        let predictions = self.predict(x)?;
        check_targets(y, x.len_of(Axis(0)), self.output_size())?;
        Ok(Evaluation {
            loss: mean_squared_error(&predictions, y),
            metric: mean_absolute_error(&predictions, y),
        })
    }

    /// Persist architecture and weights into directory `dir`.
    fn save(&self, dir: &Path) -> Result<(), ModelError>;

    fn load(dir: &Path) -> Result<Self, ModelError>;
}

pub(crate) fn check_inputs(x: &Array3<f64>, input_shape: (usize, usize)) -> Result<(), ModelError> {
    let (_, t, f) = x.dim();
    if (t, f) != input_shape {
        return Err(ModelError::shape(
            format!("(_, {}, {})", input_shape.0, input_shape.1),
            format!("{:?}", x.shape()),
        ));
    }
    Ok(())
}

pub(crate) fn check_targets(
    y: &Array2<f64>,
    samples: usize,
    outputs: usize,
) -> Result<(), ModelError> {
    if y.dim() != (samples, outputs) {
        return Err(ModelError::shape(
            format!("({samples}, {outputs})"),
            format!("{:?}", y.shape()),
        ));
    }
    Ok(())
}

pub(crate) fn mean_squared_error(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    (a - b).mapv(|d| d * d).mean().unwrap_or(0.0)
}

pub(crate) fn mean_absolute_error(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    (a - b).mapv(f64::abs).mean().unwrap_or(0.0)
}

/// Training part and optional validation tail, split like Keras does:
/// the last `validation_split` fraction of samples, in order.
pub(crate) type Holdout = (Array3<f64>, Array2<f64>, Option<(Array3<f64>, Array2<f64>)>);

pub(crate) fn holdout(
    x: &Array3<f64>,
    y: &Array2<f64>,
    validation_split: f64,
) -> Result<Holdout, ModelError> {
    if !(0.0..1.0).contains(&validation_split) {
        return Err(ModelError::Training(format!(
            "validation_split {validation_split} must be in [0, 1)"
        )));
    }
    let n = x.len_of(Axis(0));
    let split_at = (n as f64 * (1.0 - validation_split)).floor() as usize;
    if split_at == 0 {
        return Err(ModelError::Training(format!(
            "{n} samples leave nothing to train on after validation split {validation_split}"
        )));
    }
    let train_x = x.slice(s![..split_at, .., ..]).to_owned();
    let train_y = y.slice(s![..split_at, ..]).to_owned();
    let validation = (split_at < n).then(|| {
        (
            x.slice(s![split_at.., .., ..]).to_owned(),
            y.slice(s![split_at.., ..]).to_owned(),
        )
    });
    Ok((train_x, train_y, validation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdout_takes_the_tail() {
        let x = Array3::from_shape_fn((10, 2, 1), |(i, _, _)| i as f64);
        let y = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let (tx, ty, val) = holdout(&x, &y, 0.2).unwrap();

        assert_eq!(tx.len_of(Axis(0)), 8);
        assert_eq!(ty[[7, 0]], 7.0);
        let (vx, vy) = val.unwrap();
        assert_eq!(vx.len_of(Axis(0)), 2);
        assert_eq!(vy[[0, 0]], 8.0);
    }

    #[test]
    fn holdout_without_validation() {
        let x = Array3::zeros((4, 2, 1));
        let y = Array2::zeros((4, 1));
        let (tx, _, val) = holdout(&x, &y, 0.0).unwrap();
        assert_eq!(tx.len_of(Axis(0)), 4);
        assert!(val.is_none());
        assert!(holdout(&x, &y, 1.0).is_err());
    }

    #[test]
    fn error_metrics() {
        let a = Array2::from_shape_vec((2, 1), vec![1.0, 3.0]).unwrap();
        let b = Array2::from_shape_vec((2, 1), vec![2.0, 1.0]).unwrap();
        assert_eq!(mean_squared_error(&a, &b), 2.5);
        assert_eq!(mean_absolute_error(&a, &b), 1.5);
    }
}
