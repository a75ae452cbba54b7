//! Configuration section types

use crate::preprocessing::UnknownCategory;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Input CSV
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// One-hot encoded columns
    pub categorical_columns: Vec<String>,
    /// Min-max scaled columns
    pub numeric_columns: Vec<String>,
    /// Numeric column to forecast
    pub target_column: String,
    /// What to do with categories not seen at fit time
    pub unknown_category: UnknownCategory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Window length in rows
    pub length: usize,
    /// Fraction of windows used for training
    pub train_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub early_stopping_patience: usize,
    pub lr_decay_factor: f64,
    pub lr_decay_patience: usize,
    pub min_learning_rate: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Lstm,
    Linear,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Lstm => write!(f, "lstm"),
            ModelKind::Linear => write!(f, "linear"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Directory holding model.json and scalers.json
    pub dir: String,
    pub kind: ModelKind,
    /// LSTM units
    pub hidden_size: usize,
    pub learning_rate: f64,
    /// Global gradient norm cap (LSTM)
    pub gradient_clip: Option<f64>,
    /// L2 penalty (linear baseline)
    pub ridge_alpha: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Listen address for `serve`
    pub bind: String,
}
