use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::PredictError;
use crate::inference::{preprocess_image, Classifier, LabelSet, Model, Prediction};

/// Everything loaded at startup. Never mutated afterwards.
pub struct AppState {
    classifier: Option<Arc<dyn Classifier>>,
    labels: LabelSet,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Option<Arc<dyn Classifier>>, labels: LabelSet) -> Self {
        Self {
            classifier,
            labels,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Loads the artifact and label list once. A broken artifact leaves the
    /// state without a classifier; broken labels fall back to class indices.
    pub fn load(config: &ServerConfig) -> Self {
        let model = match Model::load(&config.model_path) {
            Ok(model) => {
                info!(
                    "Model loaded from {} ({} classes)",
                    config.model_path.display(),
                    model.num_classes()
                );
                Some(model)
            }
            Err(e) => {
                error!("Error loading model from {}: {}", config.model_path.display(), e);
                None
            }
        };

        let labels = match LabelSet::load(&config.labels_path) {
            Ok(labels) => {
                info!("Labels loaded successfully: {} classes", labels.len());
                labels
            }
            Err(e) => {
                warn!("Error loading labels, falling back to class indices: {}", e);
                LabelSet::default()
            }
        };

        if let Some(model) = &model {
            if !labels.is_empty() && labels.len() != model.num_classes() {
                warn!(
                    "Label count {} does not match model output width {}; predictions will use class indices",
                    labels.len(),
                    model.num_classes()
                );
            }
        }

        Self::new(
            model.map(|model| Arc::new(model) as Arc<dyn Classifier>),
            labels,
        )
        .with_upload_limit(config.max_upload_bytes)
    }

    pub fn is_model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn predict(&self, image: &[u8]) -> Result<Prediction, PredictError> {
        let classifier = self.classifier.as_ref().ok_or(PredictError::ModelNotLoaded)?;
        let input = preprocess_image(image)?;
        let probabilities = classifier.classify(&input)?;
        Ok(Prediction::from_probabilities(&probabilities, &self.labels)?)
    }
}
