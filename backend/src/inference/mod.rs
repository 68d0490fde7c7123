pub mod labels;
pub mod model;
pub mod prediction;
pub mod preprocess;

pub use labels::{LabelError, LabelSet};
pub use model::{Classifier, Model};
pub use prediction::Prediction;
pub use preprocess::{preprocess_image, rgb_pixels, CHANNELS, INPUT_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Input shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Model returned an empty output")]
    EmptyOutput,
    #[error("Model lock poisoned")]
    Poisoned,
}
