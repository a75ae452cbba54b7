//! AdPricingModel - lifecycle wrapper around a [`SequenceModel`]
//!
//! Owns two scalers: one for feature columns (fitted across every sample
//! and timestep) and one for the label columns. The feature scaler passes
//! constant columns through, since one-hot indicators can be flat over the
//! training windows. Each scaler is fitted the
//! first time it sees data and reused read-only afterwards, so repeated
//! `train` calls fine-tune the weights without moving the scaling.

use super::persistence::{self, ScalerSidecar, SCALERS_FILE};
use super::{
    check_inputs, check_targets, Evaluation, FitOptions, History, LstmConfig, LstmRegressor,
    SequenceModel,
};
use crate::error::ModelError;
use crate::preprocessing::MinMaxScaler;
use ndarray::{s, Array2, Array3, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use tracing::{debug, info};

pub struct AdPricingModel<M: SequenceModel = LstmRegressor> {
    model: M,
    feature_scaler: MinMaxScaler,
    label_scaler: MinMaxScaler,
    feature_names: Vec<String>,
}

impl AdPricingModel {
    /// Untrained LSTM for windows of `(sequence_length, features)`.
    pub fn new(input_shape: (usize, usize), output_size: usize) -> Self {
        Self::with_config(input_shape, output_size, &LstmConfig::default())
    }
}

impl<M: SequenceModel> AdPricingModel<M> {
    pub fn with_config(input_shape: (usize, usize), output_size: usize, config: &M::Config) -> Self {
        Self {
            model: M::build(input_shape, output_size, config),
            feature_scaler: MinMaxScaler::passing_constants(),
            label_scaler: MinMaxScaler::new(),
            feature_names: Vec::new(),
        }
    }

    /// Names for the feature axis; used for scaler diagnostics and importance reports.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_scaler(&self) -> &MinMaxScaler {
        &self.feature_scaler
    }

    pub fn label_scaler(&self) -> &MinMaxScaler {
        &self.label_scaler
    }

    pub fn input_shape(&self) -> (usize, usize) {
        self.model.input_shape()
    }

    /// Both scalers fitted; `predict` and `evaluate` are usable.
    pub fn is_fitted(&self) -> bool {
        self.feature_scaler.is_fitted() && self.label_scaler.is_fitted()
    }

    /// Scale `x` (and `y` when given). Scalers that have not seen data yet
    /// are fitted here; fitted scalers only transform.
    pub fn preprocess(
        &mut self,
        x: &Array3<f64>,
        y: Option<&Array2<f64>>,
    ) -> Result<(Array3<f64>, Option<Array2<f64>>), ModelError> {
        check_inputs(x, self.model.input_shape())?;

        if !self.feature_scaler.is_fitted() {
            let names = if self.feature_names.len() == x.len_of(Axis(2)) {
                self.feature_names.clone()
            } else {
                Vec::new()
            };
            self.feature_scaler.fit(flatten(x)?.view(), &names)?;
            debug!("feature scaler fitted on {} columns", x.len_of(Axis(2)));
        }
        let scaled_x = self.scale_features(x)?;

        let scaled_y = match y {
            Some(y) => {
                check_targets(y, x.len_of(Axis(0)), self.model.output_size())?;
                if !self.label_scaler.is_fitted() {
                    self.label_scaler.fit(y.view(), &[])?;
                }
                Some(self.label_scaler.transform(y.view())?)
            }
            None => None,
        };
        Ok((scaled_x, scaled_y))
    }

    /// Scale and fit. Returns the per-epoch history.
    pub fn train(
        &mut self,
        x: &Array3<f64>,
        y: &Array2<f64>,
        options: &FitOptions,
    ) -> Result<History, ModelError> {
        let (scaled_x, scaled_y) = self.preprocess(x, Some(y))?;
        let scaled_y = scaled_y.ok_or(ModelError::NotFitted("label scaler"))?;
        self.model.fit(&scaled_x, &scaled_y, options)
    }

    /// Predictions in natural units.
    pub fn predict(&self, x: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
        self.ensure_fitted()?;
        let scaled = self.model.predict(&self.scale_features(x)?)?;
        self.inverse_transform(&scaled)
    }

    /// MSE loss and MAE metric in scaled space.
    pub fn evaluate(&self, x: &Array3<f64>, y: &Array2<f64>) -> Result<Evaluation, ModelError> {
        self.ensure_fitted()?;
        let scaled_x = self.scale_features(x)?;
        let scaled_y = self.label_scaler.transform(y.view())?;
        self.model.evaluate(&scaled_x, &scaled_y)
    }

    /// Scaled model output back to natural units.
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        Ok(self.label_scaler.inverse_transform(scaled.view())?)
    }

    /// Write model weights and the scaler sidecar into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        self.ensure_fitted()?;
        persistence::ensure_dir(dir)?;
        self.model.save(dir)?;
        let sidecar = ScalerSidecar::new(
            self.feature_scaler.clone(),
            self.label_scaler.clone(),
            self.feature_names.clone(),
        );
        persistence::write_json(&dir.join(SCALERS_FILE), &sidecar)?;
        info!("💾 Model saved to {}", dir.display());
        Ok(())
    }

    /// Restore a wrapper written by [`save`](Self::save); shapes come from the artifact.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let model = M::load(dir)?;
        let path = dir.join(SCALERS_FILE);
        let sidecar: ScalerSidecar = persistence::read_json(&path)?;

        let (_, features) = model.input_shape();
        if sidecar.feature_scaler.n_columns() != features
            || sidecar.label_scaler.n_columns() != model.output_size()
        {
            return Err(ModelError::Incompatible {
                path,
                reason: format!(
                    "scalers cover {} features / {} labels, model expects {} / {}",
                    sidecar.feature_scaler.n_columns(),
                    sidecar.label_scaler.n_columns(),
                    features,
                    model.output_size()
                ),
            });
        }

        info!("📂 Model loaded from {}", dir.display());
        Ok(Self {
            model,
            feature_scaler: sidecar.feature_scaler,
            label_scaler: sidecar.label_scaler,
            feature_names: sidecar.feature_names,
        })
    }

    /// Permutation importance, one score per feature column.
    ///
    /// Each feature's whole time slice is shuffled across samples and the
    /// mean absolute change of the (scaled) prediction is recorded. Pass a
    /// seeded RNG for reproducible scores.
    pub fn feature_importance<R: Rng + ?Sized>(
        &self,
        x: &Array3<f64>,
        rng: &mut R,
    ) -> Result<Vec<f64>, ModelError> {
        self.ensure_fitted()?;
        let scaled = self.scale_features(x)?;
        let baseline = self.model.predict(&scaled)?;
        let (samples, _, features) = scaled.dim();

        let mut order: Vec<usize> = (0..samples).collect();
        let mut scores = Vec::with_capacity(features);
        for feature in 0..features {
            order.shuffle(&mut *rng);
            let mut permuted = scaled.clone();
            for (row, &source) in order.iter().enumerate() {
                permuted
                    .slice_mut(s![row, .., feature])
                    .assign(&scaled.slice(s![source, .., feature]));
            }
            let predictions = self.model.predict(&permuted)?;
            let score = (&predictions - &baseline)
                .mapv(f64::abs)
                .mean()
                .unwrap_or(0.0);
            scores.push(score);
        }
        Ok(scores)
    }

    fn ensure_fitted(&self) -> Result<(), ModelError> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(ModelError::NotFitted("AdPricingModel"))
        }
    }

    fn scale_features(&self, x: &Array3<f64>) -> Result<Array3<f64>, ModelError> {
        check_inputs(x, self.model.input_shape())?;
        let scaled = self.feature_scaler.transform(flatten(x)?.view())?;
        Array3::from_shape_vec(x.raw_dim(), scaled.iter().copied().collect())
            .map_err(|e| ModelError::shape(format!("{:?}", x.shape()), e.to_string()))
    }
}

/// `(samples, timesteps, features)` → `(samples * timesteps, features)`
fn flatten(x: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
    let (n, t, f) = x.dim();
    Array2::from_shape_vec((n * t, f), x.iter().copied().collect())
        .map_err(|e| ModelError::shape(format!("({}, {f})", n * t), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn windows() -> (Array3<f64>, Array2<f64>) {
        let x = Array3::from_shape_fn((12, 4, 2), |(i, t, f)| {
            (i + t) as f64 * 10.0 + f as f64 * 3.0
        });
        let y = Array2::from_shape_fn((12, 1), |(i, _)| 100.0 + i as f64 * 5.0);
        (x, y)
    }

    #[test]
    fn predict_before_fit_is_not_fitted() {
        let (x, _) = windows();
        let model = AdPricingModel::new((4, 2), 1);
        assert!(matches!(model.predict(&x), Err(ModelError::NotFitted(_))));
        assert!(model.save(Path::new("unused")).is_err());
    }

    #[test]
    fn preprocess_fits_once() {
        let (x, y) = windows();
        let mut model = AdPricingModel::new((4, 2), 1);
        let (sx, sy) = model.preprocess(&x, Some(&y)).unwrap();
        assert!(sx.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(sy.unwrap()[[11, 0]], 1.0);

        // A second batch outside the fitted range is transformed, not refitted
        let shifted = x.mapv(|v| v + 1000.0);
        let (sx2, _) = model.preprocess(&shifted, None).unwrap();
        assert!(sx2.iter().all(|&v| v > 1.0));
        assert_eq!(model.feature_scaler().min, vec![0.0, 3.0]);
    }

    #[test]
    fn flat_indicator_columns_do_not_block_training() {
        // Feature 1 is an indicator that never fires in the training windows
        let x = Array3::from_shape_fn((12, 4, 2), |(i, t, f)| {
            if f == 0 {
                (i + t) as f64
            } else {
                0.0
            }
        });
        let y = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let mut model = AdPricingModel::new((4, 2), 1);
        let (sx, _) = model.preprocess(&x, Some(&y)).unwrap();
        assert!(sx.slice(s![.., .., 1]).iter().all(|&v| v == 0.0));

        let mut later = x.clone();
        later.slice_mut(s![.., .., 1]).fill(1.0);
        let predictions = model.predict(&later).unwrap();
        assert!(predictions.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn predictions_come_back_in_label_units() {
        let (x, y) = windows();
        let mut model = AdPricingModel::new((4, 2), 1);
        model.preprocess(&x, Some(&y)).unwrap();
        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.dim(), (12, 1));

        let scaled = model.model().predict(&model.scale_features(&x).unwrap()).unwrap();
        let expected = scaled.mapv(|v| v * 55.0 + 100.0);
        for (a, b) in predictions.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn importance_is_seedable() {
        let (x, y) = windows();
        let mut model = AdPricingModel::new((4, 2), 1);
        model.preprocess(&x, Some(&y)).unwrap();

        let a = model
            .feature_importance(&x, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let b = model
            .feature_importance(&x, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| *s >= 0.0));
    }
}
