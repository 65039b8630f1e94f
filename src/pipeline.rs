use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::*;
use crate::inference::{InferenceService, extract_answer};
use crate::models::*;
use crate::payload::normalize;
use crate::prompt::compose;
use crate::storage::{ObjectStore, StagingLimits, stage_image};

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub staging: StagingLimits,
    pub inference_timeout: Duration,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Normalize -> stage -> compose -> infer -> shape, stopping at the first failure.
#[derive(Clone)]
pub struct AskPipeline {
    store: Arc<dyn ObjectStore>,
    inference: Arc<dyn InferenceService>,
    settings: PipelineSettings,
}

/// Successful run before shaping.
#[derive(Debug, Clone)]
pub struct Answer {
    pub image_url: Option<String>,
    pub text: String,
}

impl AskPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        inference: Arc<dyn InferenceService>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            inference,
            settings,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub async fn run(&self, payload: RawPayload) -> PipelineResult {
        let outcome = self.execute(payload).await;
        self.shape(outcome)
    }

    pub async fn execute(&self, payload: RawPayload) -> Result<Answer> {
        let started = Instant::now();

        let request = normalize(payload)?;
        log::debug!(
            "📊 Normalized request: question {} chars, image attached: {}",
            request.question.len(),
            request.image.is_some()
        );

        let image_url = stage_image(
            self.store.as_ref(),
            request.image.as_ref(),
            &self.settings.staging,
        )
        .await?;

        let message = compose(&request.question, &request.metrics, image_url.as_deref());

        log::info!("🚀 Calling {} (image: {})", self.settings.model, message.has_image());
        let content = tokio::time::timeout(
            self.settings.inference_timeout,
            self.inference.complete(&self.settings.model, &message),
        )
        .await
        .map_err(|_| {
            AppError::inference_failed(format!(
                "Inference timed out after {:?}",
                self.settings.inference_timeout
            ))
        })??;

        let text = extract_answer(content);
        log::info!("✅ Answer ready in {:?} ({} chars)", started.elapsed(), text.len());

        Ok(Answer { image_url, text })
    }

    /// The only place internal errors become the public envelope.
    pub fn shape(&self, outcome: Result<Answer>) -> PipelineResult {
        match outcome {
            Ok(answer) => PipelineResult::success(&self.settings.model, answer.image_url, answer.text),
            Err(error) => {
                log_error(&error);
                PipelineResult::failure(error.code, error.diagnostic())
            }
        }
    }
}
