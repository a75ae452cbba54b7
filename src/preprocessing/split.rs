//! Dataset Splitter - contiguous train prefix / test suffix
//!
//! Order is time, so nothing is shuffled.

use crate::error::PreprocessError;
use ndarray::{Array, Axis, Dimension, RemoveAxis};

/// Train/test partition of features and labels
#[derive(Debug, Clone, PartialEq)]
pub struct Split<DX: Dimension, DY: Dimension> {
    pub train_features: Array<f64, DX>,
    pub test_features: Array<f64, DX>,
    pub train_labels: Array<f64, DY>,
    pub test_labels: Array<f64, DY>,
}

impl<DX: Dimension, DY: Dimension> Split<DX, DY> {
    pub fn train_len(&self) -> usize {
        self.train_features.len_of(Axis(0))
    }

    pub fn test_len(&self) -> usize {
        self.test_features.len_of(Axis(0))
    }
}

/// First `floor(len * train_ratio)` samples go to train, the rest to test.
pub fn split<DX, DY>(
    features: &Array<f64, DX>,
    labels: &Array<f64, DY>,
    train_ratio: f64,
) -> Result<Split<DX, DY>, PreprocessError>
where
    DX: Dimension + RemoveAxis,
    DY: Dimension + RemoveAxis,
{
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(PreprocessError::InvalidRatio(train_ratio));
    }

    let n = features.len_of(Axis(0));
    if labels.len_of(Axis(0)) != n {
        return Err(PreprocessError::shape(
            format!("{n} labels"),
            format!("{}", labels.len_of(Axis(0))),
        ));
    }

    let split_idx = (n as f64 * train_ratio).floor() as usize;
    let (train_x, test_x) = features.view().split_at(Axis(0), split_idx);
    let (train_y, test_y) = labels.view().split_at(Axis(0), split_idx);

    Ok(Split {
        train_features: train_x.to_owned(),
        test_features: test_x.to_owned(),
        train_labels: train_y.to_owned(),
        test_labels: test_y.to_owned(),
    })
}
