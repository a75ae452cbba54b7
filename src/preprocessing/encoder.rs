//! Feature Encoder - one-hot categoricals + min-max numerics
//!
//! Column layout of the encoded matrix: the requested numeric columns first
//! (scaled into [0, 1]), then one indicator block per categorical column.
//! Each block holds one column per distinct value observed at fit time,
//! sorted lexicographically and named `<column>_<value>`.

use super::scaler::MinMaxScaler;
use crate::data::Table;
use crate::error::{DataError, PreprocessError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// What to do with a category that was not present at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    /// Encode the whole block as zeros
    #[default]
    Ignore,
    /// Fail with `UnknownCategory`
    Error,
}

/// Dense encoded features with their column names
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl EncodedMatrix {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Vocabulary of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBlock {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    categorical_columns: Vec<String>,
    numeric_columns: Vec<String>,
    unknown: UnknownCategory,
    blocks: Vec<CategoryBlock>,
    scaler: MinMaxScaler,
}

impl FeatureEncoder {
    pub fn new<S: AsRef<str>>(categorical_columns: &[S], numeric_columns: &[S]) -> Self {
        Self {
            categorical_columns: categorical_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            numeric_columns: numeric_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            unknown: UnknownCategory::default(),
            blocks: Vec::new(),
            scaler: MinMaxScaler::new(),
        }
    }

    pub fn with_unknown_policy(mut self, policy: UnknownCategory) -> Self {
        self.unknown = policy;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_fitted() || !self.blocks.is_empty()
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    pub fn blocks(&self) -> &[CategoryBlock] {
        &self.blocks
    }

    /// Output column names in matrix order
    pub fn output_columns(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        for block in &self.blocks {
            names.extend(block.values.iter().map(|v| format!("{}_{}", block.column, v)));
        }
        names
    }

    /// Fit vocabularies and the scaler on `table`, then encode it.
    pub fn encode(
        &mut self,
        table: &Table,
    ) -> Result<(EncodedMatrix, MinMaxScaler), PreprocessError> {
        let mut blocks = Vec::with_capacity(self.categorical_columns.len());
        for column in &self.categorical_columns {
            let values = table.text(column).map_err(missing)?;
            let distinct: BTreeSet<String> = values.into_iter().collect();
            blocks.push(CategoryBlock {
                column: column.clone(),
                values: distinct.into_iter().collect(),
            });
        }

        let numeric = self.numeric_block(table)?;
        let mut scaler = MinMaxScaler::new();
        if !self.numeric_columns.is_empty() {
            scaler.fit(numeric.view(), &self.numeric_columns)?;
        }

        self.blocks = blocks;
        self.scaler = scaler;
        debug!(
            "Encoder fitted: {} numeric, {} indicator columns",
            self.numeric_columns.len(),
            self.blocks.iter().map(|b| b.values.len()).sum::<usize>()
        );

        let matrix = self.assemble(table, numeric)?;
        Ok((matrix, self.scaler.clone()))
    }

    /// Encode new rows with the state learned by [`encode`](Self::encode).
    pub fn transform(&self, table: &Table) -> Result<EncodedMatrix, PreprocessError> {
        if !self.is_fitted() {
            return Err(PreprocessError::NotFitted("FeatureEncoder"));
        }
        let numeric = self.numeric_block(table)?;
        self.assemble(table, numeric)
    }

    fn numeric_block(&self, table: &Table) -> Result<Array2<f64>, PreprocessError> {
        let mut out = Array2::zeros((table.len(), self.numeric_columns.len()));
        for (j, column) in self.numeric_columns.iter().enumerate() {
            let values = table.numeric(column).map_err(missing)?;
            for (i, &v) in values.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    fn assemble(&self, table: &Table, numeric: Array2<f64>) -> Result<EncodedMatrix, PreprocessError> {
        let scaled = if self.numeric_columns.is_empty() {
            numeric
        } else {
            self.scaler.transform(numeric.view())?
        };

        let columns = self.output_columns();
        let mut values = Array2::zeros((table.len(), columns.len()));
        values
            .slice_mut(ndarray::s![.., ..self.numeric_columns.len()])
            .assign(&scaled);

        let mut offset = self.numeric_columns.len();
        for block in &self.blocks {
            let cells = table.text(&block.column).map_err(missing)?;
            let mut unseen = 0usize;
            for (i, cell) in cells.iter().enumerate() {
                match block.values.binary_search(cell) {
                    Ok(k) => values[[i, offset + k]] = 1.0,
                    Err(_) => match self.unknown {
                        UnknownCategory::Ignore => unseen += 1,
                        UnknownCategory::Error => {
                            return Err(PreprocessError::UnknownCategory {
                                column: block.column.clone(),
                                value: cell.clone(),
                            })
                        }
                    },
                }
            }
            if unseen > 0 {
                warn!(
                    "{} rows of {:?} carry categories unseen at fit time; encoded as all-zero",
                    unseen, block.column
                );
            }
            offset += block.values.len();
        }

        Ok(EncodedMatrix { columns, values })
    }
}

fn missing(err: DataError) -> PreprocessError {
    match err {
        DataError::MissingColumn(column) => PreprocessError::MissingColumn(column),
        other => PreprocessError::Data(other),
    }
}
