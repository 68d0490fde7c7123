pub mod augment;
pub mod dataset;
pub mod network;
pub mod trainer;

use std::path::PathBuf;

pub use augment::{AffineParams, Augmenter};
pub use dataset::ImageFolder;
pub use network::SignNet;
pub use trainer::{export_artifacts, EpochMetrics, EpochSummary, Trainer};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Torch error: {0}")]
    Tch(#[from] tch::TchError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Validation class {0:?} does not exist in the training set")]
    UnknownClass(String),
    #[error("No images found under {0}")]
    NoSamples(PathBuf),
}
