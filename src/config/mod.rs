//! Configuration management for AdPricing
//!
//! Defaults, then `config/default.*` and `config/local.*`, then an optional
//! explicit file, then `ADPRICING__SECTION__KEY` environment variables
//! (`.env` is loaded first).

mod types;

pub use types::*;

use crate::model::{FitOptions, LinearConfig, LstmConfig};
use crate::preprocessing::PipelineParams;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub features: FeaturesConfig,
    pub sequence: SequenceConfig,
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load configuration from the standard locations and environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), with `path` layered over the config directory.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            // Data
            .set_default("data.path", "data/ad_data.csv")?
            // Features
            .set_default(
                "features.categorical_columns",
                vec!["platform", "format", "target_audience"],
            )?
            .set_default(
                "features.numeric_columns",
                vec![
                    "bid_amount",
                    "impressions",
                    "clicks",
                    "conversions",
                    "spend",
                    "revenue",
                ],
            )?
            .set_default("features.target_column", "bid_amount")?
            .set_default("features.unknown_category", "ignore")?
            // Sequence
            .set_default("sequence.length", 10)?
            .set_default("sequence.train_ratio", 0.8)?
            // Training
            .set_default("training.epochs", 200)?
            .set_default("training.batch_size", 32)?
            .set_default("training.validation_split", 0.2)?
            .set_default("training.early_stopping_patience", 20)?
            .set_default("training.lr_decay_factor", 0.2)?
            .set_default("training.lr_decay_patience", 10)?
            .set_default("training.min_learning_rate", 0.0001)?
            .set_default("training.seed", 42)?
            // Model
            .set_default("model.dir", "models/ad_pricing")?
            .set_default("model.kind", "lstm")?
            .set_default("model.hidden_size", 32)?
            .set_default("model.learning_rate", 0.001)?
            .set_default("model.gradient_clip", 5.0)?
            .set_default("model.ridge_alpha", 0.001)?
            // Dashboard
            .set_default("dashboard.bind", "127.0.0.1:8050")?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Override with environment variables (ADPRICING__*)
            .add_source(Environment::with_prefix("ADPRICING").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Reject settings the pipeline would fail on later anyway.
    pub fn validate(&self) -> Result<()> {
        if self.sequence.length == 0 {
            bail!("sequence.length must be positive");
        }
        if !(self.sequence.train_ratio > 0.0 && self.sequence.train_ratio < 1.0) {
            bail!(
                "sequence.train_ratio must lie in (0, 1), got {}",
                self.sequence.train_ratio
            );
        }
        if !self
            .features
            .numeric_columns
            .contains(&self.features.target_column)
        {
            bail!(
                "features.target_column {:?} must be one of features.numeric_columns",
                self.features.target_column
            );
        }
        if self.training.batch_size == 0 {
            bail!("training.batch_size must be positive");
        }
        Ok(())
    }

    pub fn pipeline_params(&self) -> PipelineParams {
        PipelineParams {
            categorical_columns: self.features.categorical_columns.clone(),
            numeric_columns: self.features.numeric_columns.clone(),
            target_column: self.features.target_column.clone(),
            sequence_length: self.sequence.length,
            train_ratio: self.sequence.train_ratio,
            unknown_category: self.features.unknown_category,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        let t = &self.training;
        FitOptions {
            epochs: t.epochs,
            batch_size: t.batch_size,
            validation_split: t.validation_split,
            early_stopping_patience: t.early_stopping_patience,
            restore_best_weights: true,
            lr_decay_factor: t.lr_decay_factor,
            lr_decay_patience: t.lr_decay_patience,
            min_learning_rate: t.min_learning_rate,
            seed: t.seed,
        }
    }

    pub fn lstm_config(&self) -> LstmConfig {
        LstmConfig {
            hidden_size: self.model.hidden_size,
            learning_rate: self.model.learning_rate,
            gradient_clip: self.model.gradient_clip,
            seed: self.training.seed,
        }
    }

    pub fn linear_config(&self) -> LinearConfig {
        LinearConfig {
            alpha: self.model.ridge_alpha,
        }
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "data={} target={} seq_len={} train_ratio={:.2} model={} epochs={} dir={}",
            self.data.path,
            self.features.target_column,
            self.sequence.length,
            self.sequence.train_ratio,
            self.model.kind,
            self.training.epochs,
            self.model.dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
