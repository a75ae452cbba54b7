//! Preprocessing - Table → encoded matrix → windows → train/test split

pub mod encoder;
pub mod scaler;
pub mod sequence;
pub mod split;

pub use encoder::{CategoryBlock, EncodedMatrix, FeatureEncoder, UnknownCategory};
pub use scaler::MinMaxScaler;
pub use sequence::{build_feature_sequences, build_sequences};
pub use split::{split, Split};

use crate::data::Table;
use crate::error::PreprocessError;
use ndarray::{s, Array2, Array3, Axis, Ix2, Ix3};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters of the end-to-end preparation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    /// Numeric column whose next value is the label
    pub target_column: String,
    pub sequence_length: usize,
    pub train_ratio: f64,
    pub unknown_category: UnknownCategory,
}

/// Fitted encoder plus the parameters that shaped the windows. Saved next to
/// a trained model so later runs rebuild identical inputs from new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub params: PipelineParams,
    pub encoder: FeatureEncoder,
    pub target_index: usize,
}

impl FittedPipeline {
    /// Encode `table` with the fitted state.
    pub fn encode(&self, table: &Table) -> Result<EncodedMatrix, PreprocessError> {
        self.encoder.transform(table)
    }

    /// Every window of `table` with its label, labels shaped `(samples, 1)`.
    pub fn windows(&self, table: &Table) -> Result<(Array3<f64>, Array2<f64>), PreprocessError> {
        let matrix = self.encode(table)?;
        let (windows, labels) = build_feature_sequences(
            &matrix.values,
            self.target_index,
            self.params.sequence_length,
        )?;
        Ok((windows, labels.insert_axis(Axis(1))))
    }

    /// The trailing `sequence_length` rows as a single window, the input for
    /// forecasting the step after the last row.
    pub fn latest_window(&self, table: &Table) -> Result<Array3<f64>, PreprocessError> {
        let matrix = self.encode(table)?;
        let length = self.params.sequence_length;
        let rows = matrix.nrows();
        if length == 0 || length > rows {
            return Err(PreprocessError::InvalidLength {
                length,
                available: rows,
            });
        }
        Ok(matrix
            .values
            .slice(s![rows - length.., ..])
            .to_owned()
            .insert_axis(Axis(0)))
    }

    /// Encoded target values back to natural units
    pub fn target_inverse(&self, values: &[f64]) -> Result<Vec<f64>, PreprocessError> {
        self.encoder
            .scaler()
            .inverse_transform_column(self.target_index, values)
    }
}

/// Output of [`prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub pipeline: FittedPipeline,
    pub matrix: EncodedMatrix,
    /// Windows `(samples, sequence_length, features)` and labels `(samples, 1)`
    pub split: Split<Ix3, Ix2>,
}

impl PreparedData {
    pub fn target_inverse(&self, values: &[f64]) -> Result<Vec<f64>, PreprocessError> {
        self.pipeline.target_inverse(values)
    }

    /// `(sequence_length, features)` of every window
    pub fn input_shape(&self) -> (usize, usize) {
        let (_, t, f) = self.split.train_features.dim();
        (t, f)
    }
}

/// Encode `table`, window it on the target column and split by time.
pub fn prepare(table: &Table, params: &PipelineParams) -> Result<PreparedData, PreprocessError> {
    let mut encoder = FeatureEncoder::new(&params.categorical_columns, &params.numeric_columns)
        .with_unknown_policy(params.unknown_category);
    let (matrix, _) = encoder.encode(table)?;

    // The target must be one of the scaled numeric columns, not an indicator
    let target_index = matrix
        .column_index(&params.target_column)
        .filter(|&i| i < params.numeric_columns.len())
        .ok_or_else(|| PreprocessError::MissingColumn(params.target_column.clone()))?;

    let (windows, labels) =
        build_feature_sequences(&matrix.values, target_index, params.sequence_length)?;
    let labels = labels.insert_axis(Axis(1));
    let split = split(&windows, &labels, params.train_ratio)?;

    info!(
        "📊 Prepared {} windows of {}x{} (train {}, test {})",
        windows.len_of(Axis(0)),
        params.sequence_length,
        matrix.ncols(),
        split.train_len(),
        split.test_len()
    );

    Ok(PreparedData {
        pipeline: FittedPipeline {
            params: params.clone(),
            encoder,
            target_index,
        },
        matrix,
        split,
    })
}
