use shared::PredictionResponse;

use super::{InferenceError, LabelSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn from_probabilities(probabilities: &[f32], labels: &LabelSet) -> Result<Self, InferenceError> {
        let (index, confidence) = arg_max(probabilities).ok_or(InferenceError::EmptyOutput)?;
        Ok(Self {
            index,
            label: labels.resolve(index, probabilities.len()),
            confidence,
        })
    }
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            predicted_label: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// Index and value of the first maximum.
pub fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            None => Some((index, value)),
            Some((_, top)) if value > top => Some((index, value)),
            _ => best,
        })
}
