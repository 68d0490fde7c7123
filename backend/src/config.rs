use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL_PATH: &str = "model.pt";
pub const DEFAULT_LABELS_PATH: &str = "labels.txt";
pub const DEFAULT_TRAIN_CONFIG: &str = "config/training.yaml";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    Port(String),
    #[error("Invalid MAX_UPLOAD_BYTES value: {0}")]
    UploadLimit(String),
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Port(value.clone()))?,
            None => DEFAULT_PORT,
        };
        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::UploadLimit(value.clone()))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            host: "0.0.0.0".to_string(),
            port,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            labels_path: lookup("LABELS_PATH")
                .unwrap_or_else(|| DEFAULT_LABELS_PATH.to_string())
                .into(),
            max_upload_bytes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub dataset: DatasetConfig,
    pub training: TrainingConfig,
    pub augmentation: AugmentationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub train_dir: String,
    pub validation_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub dropout: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Degrees.
    pub rotation_range: f32,
    /// Fraction of the image width.
    pub width_shift_range: f32,
    /// Fraction of the image height.
    pub height_shift_range: f32,
    /// Degrees.
    pub shear_range: f32,
    pub zoom_range: f32,
    pub horizontal_flip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub full_model: PathBuf,
    pub mobile_model: PathBuf,
    pub labels: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("SIBI_datasets_LEMLITBANG_SIBI_R_90.10_RAW"),
            train_dir: "training".to_string(),
            validation_dir: "validation".to_string(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 100,
            learning_rate: 1e-3,
            dropout: 0.5,
            seed: None,
        }
    }
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 15.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            shear_range: 0.1,
            zoom_range: 0.1,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    pub fn disabled() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            full_model: PathBuf::from("sign_model.ot"),
            mobile_model: PathBuf::from(DEFAULT_MODEL_PATH),
            labels: PathBuf::from(DEFAULT_LABELS_PATH),
        }
    }
}

impl TrainConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to the defaults.
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn train_dir(&self) -> PathBuf {
        self.dataset.root.join(&self.dataset.train_dir)
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.dataset.root.join(&self.dataset.validation_dir)
    }
}
