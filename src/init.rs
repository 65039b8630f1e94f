use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, ErrorContext};
use crate::inference::HuggingFaceClient;
use crate::pipeline::{AskPipeline, PipelineSettings};
use crate::storage::{S3ObjectStore, StagingLimits};
use crate::AppState;

pub const DEFAULT_MODEL: &str = "meta-llama/Llama-4-Scout-17B-16E-Instruct";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub inference: InferenceConfig,
    pub s3: S3Config,
    pub upload_timeout: Duration,
    pub max_image_bytes: usize,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub token: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub public_url_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            inference: InferenceConfig {
                token: required("HF_TOKEN")?,
                base_url: optional("INFERENCE_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string()),
                model: optional("INFERENCE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or("INFERENCE_TIMEOUT_SECS", optional("INFERENCE_TIMEOUT_SECS"), 120)?),
                max_tokens: optional("INFERENCE_MAX_TOKENS")
                    .map(|v| parse("INFERENCE_MAX_TOKENS", v))
                    .transpose()?,
            },
            s3: S3Config {
                bucket: required("S3_BUCKET")?,
                region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: optional("S3_ENDPOINT"),
                access_key: required("AWS_ACCESS_KEY_ID")?,
                secret_key: required("AWS_SECRET_ACCESS_KEY")?,
                public_url_base: required("S3_PUBLIC_URL")?,
            },
            upload_timeout: Duration::from_secs(parse_or("UPLOAD_TIMEOUT_SECS", optional("UPLOAD_TIMEOUT_SECS"), 30)?),
            max_image_bytes: parse_or::<usize>("MAX_IMAGE_MB", optional("MAX_IMAGE_MB"), 10)? * 1024 * 1024,
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", optional("PORT"), 3001)?,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: self.inference.model.clone(),
            staging: StagingLimits {
                max_bytes: self.max_image_bytes,
                timeout: self.upload_timeout,
            },
            inference_timeout: self.inference.timeout,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    value.map(|v| parse(name, v)).unwrap_or(Ok(default))
}

// ============================================================================
// Startup
// ============================================================================

pub async fn app_init() -> Result<(Config, Arc<AppState>), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::info!("✅ Configuration loaded");

    // S3 Storage
    log::info!("☁️  Initializing S3 with rust-s3...");
    let store = setup_storage(&config.s3).context("S3 storage")?;
    log::info!("✅ S3 storage initialized");

    // Inference
    let inference = setup_inference(&config.inference).context("Inference client")?;
    log::info!("✅ Inference client ready ({})", config.inference.model);

    let pipeline = AskPipeline::new(store, inference, config.pipeline_settings());

    let state = Arc::new(AppState {
        pipeline,
        max_body_bytes: config.max_image_bytes + 1024 * 1024,
    });
    Ok((config, state))
}

// ============================================================================
// Setup Functions
// ============================================================================

fn setup_storage(config: &S3Config) -> Result<Arc<S3ObjectStore>, AppError> {
    let storage = S3ObjectStore::new(
        config.bucket.clone(),
        config.region.clone(),
        config.access_key.clone(),
        config.secret_key.clone(),
        config.public_url_base.clone(),
        config.endpoint.clone(),
    )?;

    Ok(Arc::new(storage))
}

fn setup_inference(config: &InferenceConfig) -> Result<Arc<HuggingFaceClient>, AppError> {
    let client = HuggingFaceClient::new(
        config.base_url.clone(),
        config.token.clone(),
        config.timeout,
        config.max_tokens,
    )?;

    Ok(Arc::new(client))
}
