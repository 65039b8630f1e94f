use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::*;
use crate::prompt::{ChatMessage, MultimodalMessage};

/// Answer used when the model returns nothing usable.
pub const FALLBACK_ANSWER: &str = "No response received.";

// ============================================================================
// Inference seam
// ============================================================================

/// A remote multimodal chat-completion capability.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// First choice's raw content, or `None` when the response carries no text.
    async fn complete(&self, model: &str, message: &MultimodalMessage) -> Result<Option<String>>;
}

/// Trimmed answer, or [`FALLBACK_ANSWER`] when empty.
pub fn extract_answer(content: Option<String>) -> String {
    content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| FALLBACK_ANSWER.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// Hugging Face router client
// ============================================================================

#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_tokens: Option<u32>,
}

impl HuggingFaceClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl InferenceService for HuggingFaceClient {
    async fn complete(&self, model: &str, message: &MultimodalMessage) -> Result<Option<String>> {
        let body = ChatCompletionRequest {
            model,
            messages: message.messages(),
            max_tokens: self.max_tokens,
            stream: false,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::inference_failed(format!("Inference request timed out: {}", e))
                } else {
                    AppError::inference_failed(format!("Inference request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::inference_failed(format!("Inference body read failed: {}", e)))?;

        log::debug!("🧠 Inference answered {} in {:?}", status, started.elapsed());

        if !status.is_success() {
            return Err(AppError::inference_failed(remote_error_message(status, &text))
                .with_details(serde_json::json!({ "status": status.as_u16() })));
        }

        match serde_json::from_str::<ChatCompletionResponse>(&text) {
            Ok(parsed) => Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content)),
            Err(e) => {
                log::warn!("⚠️  Unexpected inference response shape: {}", e);
                Ok(None)
            }
        }
    }
}

/// Pulls `error` or `error.message` out of a failure body, falling back to the status line.
fn remote_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            let error = json.get("error")?;
            error
                .as_str()
                .or_else(|| error.get("message").and_then(|m| m.as_str()))
                .map(|s| s.to_string())
        });

    match from_body {
        Some(message) => format!("{}: {}", status, message),
        None => status.to_string(),
    }
}
