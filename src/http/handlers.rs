use super::state::AppState;
use crate::error::PipelineError;
use crate::records::ObservationRecord;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// POST /observations/:subject_id/audio
/// Run the full pipeline over an uploaded recording and persist the result.
///
/// Multipart parts: `file` (required, must carry a filename) and
/// `description` (optional free text, used as the transcription fallback).
pub async fn process_audio(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut description: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Malformed multipart body: {}", e),
                    }),
                )
                    .into_response();
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => {
                        let Some(filename) = filename else {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(ErrorResponse {
                                    error: "Audio file must have a filename".to_string(),
                                }),
                            )
                                .into_response();
                        };
                        file = Some((filename, bytes.to_vec()));
                    }
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse {
                                error: format!("Failed to read file part: {}", e),
                            }),
                        )
                            .into_response();
                    }
                }
            }
            Some("description") => match field.text().await {
                Ok(text) => {
                    if !text.trim().is_empty() {
                        description = Some(text);
                    }
                }
                Err(e) => {
                    // Description is optional; process the upload without it
                    warn!("Failed to read description part: {}", e);
                }
            },
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing 'file' part".to_string(),
            }),
        )
            .into_response();
    };

    info!(
        "Processing upload for subject {}: {:?} ({} bytes)",
        subject_id,
        filename,
        bytes.len()
    );

    match state
        .orchestrator
        .process(bytes, &filename, description)
        .await
    {
        Ok(outcome) => {
            let record = ObservationRecord::from_outcome(&subject_id, &outcome);
            state.repository.save_observation(record).await;
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => {
            error!("Pipeline failed for subject {}: {}", subject_id, e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /observations/:subject_id
/// Stored behavioral records for a subject
pub async fn get_observations(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> impl IntoResponse {
    let records = state.repository.observations_for(&subject_id).await;
    (StatusCode::OK, Json(records)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
        PipelineError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::DecodeExhausted(_) | PipelineError::TooShort { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
