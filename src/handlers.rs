use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::*;
use crate::payload::read_multipart;
use crate::pipeline::AskPipeline;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub pipeline: AskPipeline,
    pub max_body_bytes: usize,
}

// ============================================================================
// HTTP Handlers
// ============================================================================

impl IntoResponse for PipelineResult {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// POST /api/ask-mistral
///
/// Multipart body: `prompt` (text), `metrics` (JSON text), `image` (file). All optional.
/// A body that is not multipart at all still gets the JSON envelope.
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> PipelineResult {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            let error = AppError::malformed_input(format!("Multipart: {}", rejection.body_text()));
            return state.pipeline.shape(Err(error));
        }
    };

    match read_multipart(multipart).await {
        Ok(payload) => state.pipeline.run(payload).await,
        Err(error) => state.pipeline.shape(Err(error)),
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.pipeline.model().to_string(),
    })
}
