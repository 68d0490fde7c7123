use actix_multipart::Multipart;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use shared::{PredictionResponse, StatusResponse};

use crate::error::PredictError;
use crate::state::AppState;

pub const STATUS_MESSAGE: &str = "Sign Language Detection Backend is running!";
const FILE_FIELD: &str = "file";
const MULTIPART_PREFIX: &str = "multipart/";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

async fn home() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: STATUS_MESSAGE.to_string(),
    })
}

struct Upload {
    filename: String,
    data: Vec<u8>,
}

async fn predict(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    if !state.is_model_loaded() {
        return Err(PredictError::ModelNotLoaded);
    }
    if !is_multipart(req.content_type()) {
        return Err(PredictError::MissingFilePart);
    }

    let Upload { filename, data } = read_upload(payload, state.max_upload_bytes()).await?;

    let worker_state = state.clone();
    let result = web::block(move || worker_state.predict(&data)).await?;
    match result {
        Ok(prediction) => {
            info!(
                "File: {} | Predicted: {} ({:.2})",
                filename, prediction.label, prediction.confidence
            );
            Ok(HttpResponse::Ok().json(PredictionResponse::from(prediction)))
        }
        Err(e) => {
            error!("Prediction error for {}: {}", filename, e);
            Err(e)
        }
    }
}

/// Media types are case-insensitive.
fn is_multipart(content_type: &str) -> bool {
    content_type
        .get(..MULTIPART_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MULTIPART_PREFIX))
}

/// First part named `file` that carries a filename; other parts are drained.
/// The kept file may not exceed `limit` bytes.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload, PredictError> {
    let mut upload: Option<Upload> = None;

    while let Some(mut field) = payload.try_next().await? {
        let filename = match (field.name(), field.content_disposition()) {
            (Some(FILE_FIELD), Some(disposition)) if upload.is_none() => {
                disposition.get_filename().map(str::to_owned)
            }
            _ => None,
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if filename.is_some() {
                if data.len() + chunk.len() > limit {
                    return Err(PredictError::Upload(format!(
                        "File exceeds the {limit} byte upload limit"
                    )));
                }
                data.extend_from_slice(&chunk);
            }
        }

        if let Some(filename) = filename {
            upload = Some(Upload { filename, data });
        }
    }

    let upload = upload.ok_or(PredictError::MissingFilePart)?;
    if upload.filename.is_empty() {
        return Err(PredictError::NoFileSelected);
    }
    Ok(upload)
}
