//! LSTM Regressor (Burn)
//!
//! One `burn::nn::Lstm` layer whose last hidden state feeds a dense head.
//! Trained on the CPU `NdArray` backend wrapped in `Autodiff`, with Burn's
//! Adam and optional global-norm gradient clipping. Inference runs on the
//! plain backend via [`AutodiffModule::valid`].
//!
//! On disk the model is `model.json` (kind, config, shapes) plus the Burn
//! record `lstm_weights.bin`.

use super::callbacks::{EarlyStopping, ReduceLrOnPlateau, StopSignal};
use super::persistence::{self, FORMAT_VERSION, MODEL_FILE};
use super::{
    check_inputs, check_targets, holdout, mean_squared_error, FitOptions, History, SequenceModel,
};
use crate::error::ModelError;
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::grad_clipping::GradientClippingConfig;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig as DenseConfig, Lstm, LstmConfig as LstmLayerConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KIND: &str = "lstm";

pub const WEIGHTS_FILE: &str = "lstm_weights.bin";

const EPSILON: f32 = 1e-7;

type InferenceBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferenceBackend>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    pub hidden_size: usize,
    pub learning_rate: f64,
    /// Max global L2 norm of the gradient, `None` disables clipping
    pub gradient_clip: Option<f64>,
    /// Seed for weight initialisation
    pub seed: u64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            hidden_size: 32,
            learning_rate: 0.001,
            gradient_clip: Some(5.0),
            seed: 42,
        }
    }
}

#[derive(Module, Debug)]
pub struct LstmNet<B: Backend> {
    lstm: Lstm<B>,
    head: Linear<B>,
}

impl<B: Backend> LstmNet<B> {
    fn init(features: usize, hidden: usize, outputs: usize, device: &B::Device) -> Self {
        Self {
            lstm: LstmLayerConfig::new(features, hidden, true).init(device),
            head: DenseConfig::new(hidden, outputs).init(device),
        }
    }

    /// `[batch, timesteps, features]` → `[batch, outputs]`
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let (sequence, _) = self.lstm.forward(x, None);
        let [batch, timesteps, hidden] = sequence.dims();
        let last = sequence
            .slice([0..batch, timesteps - 1..timesteps, 0..hidden])
            .reshape([batch, hidden]);
        self.head.forward(last)
    }

    /// `(hidden, outputs)` read back from the head weights
    fn head_shape(&self) -> (usize, usize) {
        let [hidden, outputs] = self.head.weight.val().dims();
        (hidden, outputs)
    }
}

fn to_tensor3<B: Backend>(x: &Array3<f64>, device: &B::Device) -> Tensor<B, 3> {
    let (n, t, f) = x.dim();
    let values: Vec<f32> = x.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, [n, t, f]), device)
}

fn to_tensor2<B: Backend>(y: &Array2<f64>, device: &B::Device) -> Tensor<B, 2> {
    let (n, o) = y.dim();
    let values: Vec<f32> = y.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, [n, o]), device)
}

fn to_array2<B: Backend>(output: Tensor<B, 2>) -> Result<Array2<f64>, ModelError> {
    let [rows, cols] = output.dims();
    let values: Vec<f32> = output
        .into_data()
        .to_vec()
        .map_err(|e| ModelError::Training(format!("reading model output: {e:?}")))?;
    Array2::from_shape_vec((rows, cols), values.into_iter().map(f64::from).collect())
        .map_err(|e| ModelError::shape(format!("({rows}, {cols})"), e.to_string()))
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::new()
}

/// Single-layer LSTM with a linear output head
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    config: LstmConfig,
    input_shape: (usize, usize),
    output_size: usize,
    device: NdArrayDevice,
    net: LstmNet<TrainBackend>,
}

/// `model.json` for an LSTM; the weights live in the file it names
#[derive(Serialize, Deserialize)]
struct SavedLstm {
    version: String,
    kind: String,
    saved_at: i64,
    config: LstmConfig,
    input_shape: (usize, usize),
    output_size: usize,
    weights: String,
}

impl LstmRegressor {
    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    fn predict_with(
        &self,
        net: &LstmNet<InferenceBackend>,
        x: &Array3<f64>,
    ) -> Result<Array2<f64>, ModelError> {
        if x.len_of(Axis(0)) == 0 {
            return Ok(Array2::zeros((0, self.output_size)));
        }
        to_array2(net.forward(to_tensor3(x, &self.device)))
    }
}

impl SequenceModel for LstmRegressor {
    type Config = LstmConfig;

    fn build(input_shape: (usize, usize), output_size: usize, config: &LstmConfig) -> Self {
        let device = NdArrayDevice::default();
        // NdArray keeps one process-wide RNG for parameter init
        TrainBackend::seed(config.seed);
        let net = LstmNet::init(input_shape.1, config.hidden_size, output_size, &device);
        Self {
            config: config.clone(),
            input_shape,
            output_size,
            device,
            net,
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
        if options.batch_size == 0 {
            return Err(ModelError::Training("batch_size must be positive".to_string()));
        }

        let (train_x, train_y, validation) = holdout(x, y, options.validation_split)?;
        let samples = train_x.len_of(Axis(0));

        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut order: Vec<usize> = (0..samples).collect();
        let mut optim = AdamConfig::new()
            .with_epsilon(EPSILON)
            .with_grad_clipping(
                self.config
                    .gradient_clip
                    .map(|norm| GradientClippingConfig::Norm(norm as f32)),
            )
            .init::<TrainBackend, LstmNet<TrainBackend>>();
        let mse = MseLoss::new();
        let mut lr = self.config.learning_rate;
        let mut stopper = EarlyStopping::new(options.early_stopping_patience);
        let mut plateau = ReduceLrOnPlateau::new(
            options.lr_decay_factor,
            options.lr_decay_patience,
            options.min_learning_rate,
        );
        let mut net = self.net.clone();
        let mut best = net.clone();
        let mut history = History::default();

        info!(
            "🧠 Training LSTM: {} train / {} validation samples, up to {} epochs",
            samples,
            validation.as_ref().map_or(0, |(vx, _)| vx.len_of(Axis(0))),
            options.epochs
        );

        for epoch in 0..options.epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;
            for batch in order.chunks(options.batch_size) {
                let bx = to_tensor3::<TrainBackend>(&train_x.select(Axis(0), batch), &self.device);
                let by = to_tensor2::<TrainBackend>(&train_y.select(Axis(0), batch), &self.device);
                let loss = mse.forward(net.forward(bx), by, Reduction::Mean);
                total += loss.clone().into_scalar().elem::<f64>() * batch.len() as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &net);
                net = optim.step(lr, net, grads);
            }
            let loss = total / samples as f64;
            if !loss.is_finite() {
                return Err(ModelError::Training(format!(
                    "loss became {loss} at epoch {epoch}"
                )));
            }

            let monitored = match &validation {
                Some((vx, vy)) => {
                    let val = mean_squared_error(&self.predict_with(&net.valid(), vx)?, vy);
                    history.val_loss.push(val);
                    val
                }
                None => loss,
            };
            history.loss.push(loss);
            history.learning_rate.push(lr);
            debug!(epoch, loss, monitored, lr, "epoch finished");

            match stopper.observe(epoch, monitored) {
                StopSignal::Improved => best = net.clone(),
                StopSignal::Waiting => {}
                StopSignal::Stop => {
                    history.stopped_epoch = Some(epoch);
                    break;
                }
            }
            lr = plateau.observe(monitored, lr);
        }

        history.best_epoch = stopper.best_epoch();
        self.net = if options.restore_best_weights && history.best_epoch.is_some() {
            best
        } else {
            net
        };

        info!(
            "✅ LSTM trained for {} epochs (best {:.6} at epoch {:?})",
            history.epochs_run(),
            stopper.best(),
            history.best_epoch
        );
        Ok(history)
    }

    fn predict(&self, x: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
        check_inputs(x, self.input_shape)?;
        self.predict_with(&self.net.valid(), x)
    }

    fn save(&self, dir: &Path) -> Result<(), ModelError> {
        persistence::ensure_dir(dir)?;
        let saved = SavedLstm {
            version: FORMAT_VERSION.to_string(),
            kind: KIND.to_string(),
            saved_at: chrono::Utc::now().timestamp_millis(),
            config: self.config.clone(),
            input_shape: self.input_shape,
            output_size: self.output_size,
            weights: WEIGHTS_FILE.to_string(),
        };
        persistence::write_json(&dir.join(MODEL_FILE), &saved)?;

        let path = dir.join(WEIGHTS_FILE);
        self.net
            .valid()
            .save_file(path.clone(), &recorder())
            .map_err(|e| ModelError::Weights {
                path,
                reason: format!("{e:?}"),
            })
    }

    fn load(dir: &Path) -> Result<Self, ModelError> {
        let path = dir.join(MODEL_FILE);
        let saved: SavedLstm = persistence::read_json(&path)?;
        if saved.kind != KIND {
            return Err(ModelError::Incompatible {
                path,
                reason: format!("expected a {KIND} model, found {:?}", saved.kind),
            });
        }

        let device = NdArrayDevice::default();
        let weights: PathBuf = dir.join(&saved.weights);
        let net = LstmNet::<TrainBackend>::init(
            saved.input_shape.1,
            saved.config.hidden_size,
            saved.output_size,
            &device,
        )
        .load_file(weights.clone(), &recorder(), &device)
        .map_err(|e| ModelError::Weights {
            path: weights.clone(),
            reason: format!("{e:?}"),
        })?;

        let expected = (saved.config.hidden_size, saved.output_size);
        if net.head_shape() != expected {
            return Err(ModelError::Incompatible {
                path: weights,
                reason: format!(
                    "head weights are {:?}, expected {:?}",
                    net.head_shape(),
                    expected
                ),
            });
        }

        Ok(Self {
            config: saved.config,
            input_shape: saved.input_shape,
            output_size: saved.output_size,
            device,
            net,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> (LstmRegressor, Array3<f64>, Array2<f64>) {
        let config = LstmConfig {
            hidden_size: 3,
            ..LstmConfig::default()
        };
        let model = LstmRegressor::build((3, 2), 1, &config);
        let x = Array3::from_shape_fn((4, 3, 2), |(i, t, f)| {
            ((i * 7 + t * 3 + f) as f64 * 0.37).sin()
        });
        let y = Array2::from_shape_fn((4, 1), |(i, _)| (i as f64 * 0.5).cos());
        (model, x, y)
    }

    #[test]
    fn untrained_model_predicts_one_row_per_window() {
        let (model, x, _) = tiny();
        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.dim(), (4, 1));
        assert!(predictions.iter().all(|v| v.is_finite()));

        let empty = model.predict(&Array3::zeros((0, 3, 2))).unwrap();
        assert_eq!(empty.dim(), (0, 1));
    }

    #[test]
    fn training_reduces_loss() {
        let series: Vec<f64> = (0..60).map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin()).collect();
        let x = Array3::from_shape_fn((50, 10, 1), |(i, t, _)| series[i + t]);
        let y = Array2::from_shape_fn((50, 1), |(i, _)| series[i + 10]);

        let config = LstmConfig {
            hidden_size: 8,
            learning_rate: 0.01,
            ..LstmConfig::default()
        };
        let mut model = LstmRegressor::build((10, 1), 1, &config);
        let options = FitOptions {
            epochs: 30,
            batch_size: 8,
            validation_split: 0.0,
            ..FitOptions::default()
        };
        let history = model.fit(&x, &y, &options).unwrap();

        assert_eq!(history.epochs_run(), 30);
        assert!(history.val_loss.is_empty());
        assert!(history.loss[29] < history.loss[0]);
    }

    #[test]
    fn weights_survive_save_and_load() {
        let (model, x, _) = tiny();
        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        assert!(dir.path().join(WEIGHTS_FILE).exists());

        let restored = LstmRegressor::load(dir.path()).unwrap();
        assert_eq!(restored.input_shape(), (3, 2));
        assert_eq!(restored.config(), model.config());
        assert_eq!(model.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn missing_weight_file_is_an_error() {
        let (model, _, _) = tiny();
        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(WEIGHTS_FILE)).unwrap();

        assert!(matches!(
            LstmRegressor::load(dir.path()),
            Err(ModelError::Weights { .. })
        ));
    }

    #[test]
    fn wrong_input_shape_is_rejected() {
        let (model, _, _) = tiny();
        let x = Array3::zeros((2, 4, 2));
        assert!(matches!(
            model.predict(&x),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let (mut model, x, y) = tiny();
        let options = FitOptions {
            batch_size: 0,
            ..FitOptions::default()
        };
        assert!(matches!(
            model.fit(&x, &y, &options),
            Err(ModelError::Training(_))
        ));
    }
}
