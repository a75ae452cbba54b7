//! Min-max scaler
//!
//! Per-column `(min, max)` learned at fit time. By default a column with
//! `max == min` is rejected with [`PreprocessError::DegenerateColumn`]
//! rather than silently producing NaN. A scaler built with
//! [`MinMaxScaler::passing_constants`] instead keeps such columns with a
//! unit range, so they come out as `x - min` (0 on the fitted data).

use crate::error::PreprocessError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MinMaxScaler {
    /// Column names, for error context only
    pub columns: Vec<String>,
    /// Learned minimum per column
    pub min: Vec<f64>,
    /// Learned maximum per column
    pub max: Vec<f64>,
    /// Keep zero-variance columns with a unit range instead of failing
    #[serde(default)]
    pub pass_constant: bool,
}

impl MinMaxScaler {
    /// Unfitted scaler; columns are labelled `col_<i>` until fitted with names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfitted scaler that tolerates zero-variance columns. One-hot
    /// indicators are often constant over a training prefix, e.g. a
    /// platform that first shows up in the test rows.
    pub fn passing_constants() -> Self {
        Self {
            pass_constant: true,
            ..Self::default()
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.min.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.min.len()
    }

    /// Learn per-column bounds. `names` may be empty, in which case columns
    /// are labelled by index.
    pub fn fit(&mut self, data: ArrayView2<f64>, names: &[String]) -> Result<(), PreprocessError> {
        if data.nrows() == 0 {
            return Err(PreprocessError::shape("at least one row", "0 rows"));
        }
        if !names.is_empty() && names.len() != data.ncols() {
            return Err(PreprocessError::shape(
                format!("{} column names", data.ncols()),
                format!("{}", names.len()),
            ));
        }

        let columns: Vec<String> = if names.is_empty() {
            (0..data.ncols()).map(|i| format!("col_{i}")).collect()
        } else {
            names.to_vec()
        };

        let mut min = Vec::with_capacity(data.ncols());
        let mut max = Vec::with_capacity(data.ncols());
        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let (lo, hi) = bounds(column);
            if hi - lo == 0.0 {
                if !self.pass_constant {
                    return Err(PreprocessError::DegenerateColumn {
                        column: columns[j].clone(),
                        value: lo,
                    });
                }
                min.push(lo);
                max.push(lo + 1.0);
                continue;
            }
            min.push(lo);
            max.push(hi);
        }

        self.columns = columns;
        self.min = min;
        self.max = max;
        Ok(())
    }

    /// `(x - min) / (max - min)` per column
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, PreprocessError> {
        self.check(data.ncols())?;
        let mut out = data.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, range) = (self.min[j], self.max[j] - self.min[j]);
            column.mapv_inplace(|x| (x - lo) / range);
        }
        Ok(out)
    }

    pub fn fit_transform(
        &mut self,
        data: ArrayView2<f64>,
        names: &[String],
    ) -> Result<Array2<f64>, PreprocessError> {
        self.fit(data, names)?;
        self.transform(data)
    }

    /// Undo [`transform`](Self::transform) for every column.
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, PreprocessError> {
        self.check(data.ncols())?;
        let mut out = data.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, range) = (self.min[j], self.max[j] - self.min[j]);
            column.mapv_inplace(|x| x * range + lo);
        }
        Ok(out)
    }

    /// Undo the transform for a single column, e.g. to turn a scaled
    /// prediction back into dollars.
    pub fn inverse_transform_column(
        &self,
        column: usize,
        values: &[f64],
    ) -> Result<Vec<f64>, PreprocessError> {
        if !self.is_fitted() {
            return Err(PreprocessError::NotFitted("MinMaxScaler"));
        }
        if column >= self.n_columns() {
            return Err(PreprocessError::shape(
                format!("column < {}", self.n_columns()),
                column.to_string(),
            ));
        }
        let (lo, range) = (self.min[column], self.max[column] - self.min[column]);
        Ok(values.iter().map(|x| x * range + lo).collect())
    }

    fn check(&self, ncols: usize) -> Result<(), PreprocessError> {
        if !self.is_fitted() {
            return Err(PreprocessError::NotFitted("MinMaxScaler"));
        }
        if ncols != self.n_columns() {
            return Err(PreprocessError::shape(
                format!("{} columns", self.n_columns()),
                format!("{ncols} columns"),
            ));
        }
        Ok(())
    }
}

fn bounds(column: ArrayView1<f64>) -> (f64, f64) {
    column
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}
