use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::error::*;
use crate::models::*;

// ============================================================================
// Multipart extraction
// ============================================================================

/// Collects `prompt`, `metrics` and the first non-empty `image` part.
pub async fn read_multipart(mut multipart: Multipart) -> Result<RawPayload> {
    let mut payload = RawPayload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::malformed_input(format!("Multipart: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("prompt") => {
                let text = field.text().await.map_err(|e| {
                    AppError::malformed_input(format!("Read prompt: {}", e))
                })?;
                payload.prompt = Some(text);
            }
            Some("metrics") => {
                let text = field.text().await.map_err(|e| {
                    AppError::malformed_input(format!("Read metrics: {}", e))
                })?;
                payload.metrics = Some(text);
            }
            Some("image") if payload.image.is_none() => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(image_read_error)?;

                if data.is_empty() {
                    log::debug!("Ignoring empty image part");
                    continue;
                }

                payload.image = Some(ImageUpload {
                    data,
                    filename,
                    content_type,
                });
            }
            Some(other) => log::debug!("Ignoring multipart field {:?}", other),
            None => {}
        }
    }

    Ok(payload)
}

/// Hitting the body limit mid-image is an oversized image, not a malformed request.
fn image_read_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::upload_failed(format!("Image too large: {}", error.body_text()))
    } else {
        AppError::malformed_input(format!("Read image: {}", error))
    }
}

// ============================================================================
// Normalization
// ============================================================================

pub fn normalize(payload: RawPayload) -> Result<InferenceRequest> {
    let metrics = parse_metrics(payload.metrics.as_deref())?;

    Ok(InferenceRequest {
        question: payload.prompt.unwrap_or_default(),
        metrics,
        image: payload.image,
    })
}

/// Absent, blank or `null` input yields an all-placeholder record.
pub fn parse_metrics(raw: Option<&str>) -> Result<RegionMetrics> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(RegionMetrics::default()),
    };

    let value: Value = serde_json::from_str(raw)?;
    let object = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(RegionMetrics::default()),
        other => {
            return Err(AppError::malformed_input(format!(
                "metrics must be a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };

    Ok(metrics_from_object(&object))
}

fn metrics_from_object(object: &Map<String, Value>) -> RegionMetrics {
    let mut metrics = RegionMetrics::default();
    for field in MetricField::iter() {
        *metrics.slot_mut(field) = object.get(field.key()).and_then(render_value);
    }
    metrics
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
