use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::InferenceError;

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("No file part in request")]
    MissingFilePart,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Upload error: {0}")]
    Upload(String),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Worker pool error: {0}")]
    Blocking(String),
}

impl From<actix_multipart::MultipartError> for PredictError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        PredictError::Upload(err.to_string())
    }
}

impl From<BlockingError> for PredictError {
    fn from(err: BlockingError) -> Self {
        PredictError::Blocking(err.to_string())
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFilePart | PredictError::NoFileSelected => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
