//! Sequence Builder - sliding windows with stride 1

use crate::error::PreprocessError;
use ndarray::{s, Array1, Array2, Array3};

/// Windows of `sequence_length` values paired with the value that follows.
///
/// For a series of length `N` this yields `N - sequence_length` windows:
/// window `i` is `series[i..i + sequence_length]`, label `i` is
/// `series[i + sequence_length]`.
pub fn build_sequences(
    series: &[f64],
    sequence_length: usize,
) -> Result<(Array2<f64>, Array1<f64>), PreprocessError> {
    check_length(sequence_length, series.len())?;

    let n_windows = series.len() - sequence_length;
    let features = Array2::from_shape_fn((n_windows, sequence_length), |(i, t)| series[i + t]);
    let labels = Array1::from_shape_fn(n_windows, |i| series[i + sequence_length]);

    Ok((features, labels))
}

/// Per-feature variant: windows over the rows of `matrix`, labelled with the
/// next row's `target_column`. Output shape is
/// `(rows - sequence_length, sequence_length, columns)`.
pub fn build_feature_sequences(
    matrix: &Array2<f64>,
    target_column: usize,
    sequence_length: usize,
) -> Result<(Array3<f64>, Array1<f64>), PreprocessError> {
    check_length(sequence_length, matrix.nrows())?;
    if target_column >= matrix.ncols() {
        return Err(PreprocessError::shape(
            format!("target column < {}", matrix.ncols()),
            target_column.to_string(),
        ));
    }

    let n_windows = matrix.nrows() - sequence_length;
    let mut features = Array3::zeros((n_windows, sequence_length, matrix.ncols()));
    for i in 0..n_windows {
        features
            .slice_mut(s![i, .., ..])
            .assign(&matrix.slice(s![i..i + sequence_length, ..]));
    }
    let labels = Array1::from_shape_fn(n_windows, |i| matrix[[i + sequence_length, target_column]]);

    Ok((features, labels))
}

fn check_length(sequence_length: usize, available: usize) -> Result<(), PreprocessError> {
    if sequence_length == 0 || sequence_length >= available {
        return Err(PreprocessError::InvalidLength {
            length: sequence_length,
            available,
        });
    }
    Ok(())
}
