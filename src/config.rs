//! Application configuration loaded from a TOML file.
//!
//! Every tunable has a default matching the shipped demo behavior, so a
//! missing config file is not an error; a malformed one is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The app config directory could not be resolved or created.
    #[error(transparent)]
    Dir(#[from] AppDirError),
    /// The config file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file exists but is not valid TOML for this schema.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureSettings,
    pub training: TrainingSettings,
    pub prediction: PredictionSettings,
    pub camera: CameraSettings,
    pub alert: AlertSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            training: TrainingSettings::default(),
            prediction: PredictionSettings::default(),
            camera: CameraSettings::default(),
            alert: AlertSettings::default(),
        }
    }
}

/// Labeling-burst tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frames appended per labeling action.
    pub burst_len: u32,
    /// Milliseconds between captured frames within a burst.
    pub interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            burst_len: 100,
            interval_ms: 60,
        }
    }
}

/// Trainer tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub epochs: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: 15,
            learning_rate: 0.00001,
            seed: 42,
        }
    }
}

/// Prediction-poll tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Milliseconds between inference polls while predicting.
    pub interval_ms: u64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

/// Camera preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Start with the front-facing device.
    pub front_camera: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self { front_camera: true }
    }
}

/// Alert-sound preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Output volume in 0.0..=1.0.
    pub volume: f32,
    /// Optional audio file looped as the alert; a synthesized tone otherwise.
    pub sound_path: Option<PathBuf>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            sound_path: None,
        }
    }
}

/// Path of the config file inside the app root.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;
    load_from(&path)
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let parsed: AppConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [capture]
            burst_len = 10

            [training]
            epochs = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.burst_len, 10);
        assert_eq!(parsed.capture.interval_ms, 60);
        assert_eq!(parsed.training.epochs, 3);
        assert_eq!(parsed.training.learning_rate, 0.00001);
        assert_eq!(parsed.prediction.interval_ms, 500);
        assert!(parsed.camera.front_camera);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "capture = 3").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse { .. })));
    }
}
