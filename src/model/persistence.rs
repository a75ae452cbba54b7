//! Model directory layout and JSON helpers
//!
//! A saved model is a directory:
//! - `model.json`: kind, config and shapes of the [`SequenceModel`](super::SequenceModel);
//!   the linear baseline inlines its coefficients, the LSTM names its Burn
//!   weight record (`lstm_weights.bin`)
//! - `scalers.json`: fitted feature and label scalers
//! - `pipeline.json`: the fitted encoder, written by the CLI

use crate::error::ModelError;
use crate::preprocessing::MinMaxScaler;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const MODEL_FILE: &str = "model.json";
pub const SCALERS_FILE: &str = "scalers.json";
pub const PIPELINE_FILE: &str = "pipeline.json";
pub const FORMAT_VERSION: &str = "1.0";

/// Scaler state written next to the model weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerSidecar {
    pub version: String,
    pub feature_scaler: MinMaxScaler,
    pub label_scaler: MinMaxScaler,
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub saved_at: i64,
}

impl ScalerSidecar {
    pub fn new(
        feature_scaler: MinMaxScaler,
        label_scaler: MinMaxScaler,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            feature_scaler,
            label_scaler,
            feature_names,
            saved_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ModelError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("💾 Saved {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let json = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&json).map_err(|source| ModelError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    info!("📂 Loaded {}", path.display());
    Ok(value)
}

pub fn ensure_dir(dir: &Path) -> Result<(), ModelError> {
    fs::create_dir_all(dir).map_err(|source| ModelError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCALERS_FILE);
        let scaler = MinMaxScaler {
            columns: vec!["spend".into()],
            min: vec![1.5],
            max: vec![99.25],
            pass_constant: true,
        };
        let sidecar = ScalerSidecar::new(scaler.clone(), scaler, vec!["spend".into()]);
        write_json(&path, &sidecar).unwrap();

        let restored: ScalerSidecar = read_json(&path).unwrap();
        assert_eq!(restored.version, FORMAT_VERSION);
        assert_eq!(restored.feature_scaler, sidecar.feature_scaler);
        assert_eq!(restored.saved_at, sidecar.saved_at);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<ScalerSidecar>(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn garbage_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCALERS_FILE);
        fs::write(&path, "{not json").unwrap();
        let err = read_json::<ScalerSidecar>(&path).unwrap_err();
        assert!(matches!(err, ModelError::Serialization { .. }));
    }
}
