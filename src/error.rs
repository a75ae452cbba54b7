//! Error taxonomy
//!
//! One enum per pipeline stage. Every variant carries the column, path or
//! parameter value needed to diagnose the failure; nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the source table.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("missing column {0:?}")]
    MissingColumn(String),

    #[error("column {column:?} row {row}: {value:?} is not numeric")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// Failures in encoding, scaling, windowing and splitting.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("missing column {0:?}")]
    MissingColumn(String),

    #[error("sequence length {length} invalid for a series of {available} values")]
    InvalidLength { length: usize, available: usize },

    #[error("train ratio {0} must lie strictly between 0 and 1")]
    InvalidRatio(f64),

    #[error("column {column:?} has zero variance (min == max == {value})")]
    DegenerateColumn { column: String, value: f64 },

    #[error("{0} used before it was fitted")]
    NotFitted(&'static str),

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("column {column:?}: category {value:?} was not seen during fit")]
    UnknownCategory { column: String, value: String },
}

/// Failures of the model capability or the lifecycle wrapper.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model used before training: {0}")]
    NotFitted(&'static str),

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error at {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("training failed: {0}")]
    Training(String),

    #[error("incompatible model artifact at {path}: {reason}")]
    Incompatible { path: PathBuf, reason: String },

    #[error("weight file {path}: {reason}")]
    Weights { path: PathBuf, reason: String },
}

/// Failures computing metrics.
#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("{metric}: denominator is zero")]
    DivisionByZero { metric: &'static str },

    #[error("length mismatch: {expected} true values vs {actual} predictions")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("no values to evaluate")]
    EmptyInput,
}

impl ModelError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl PreprocessError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
