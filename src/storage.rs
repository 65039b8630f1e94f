use crate::error::*;
use crate::models::ImageUpload;
use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// Object store seam
// ============================================================================

/// Writes image bytes somewhere publicly reachable.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the public URL of the stored object.
    async fn put_image(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;
}

// ============================================================================
// Storage Service with rust-s3
// ============================================================================

#[derive(Clone)]
pub struct S3ObjectStore {
    bucket: Bucket,
    public_url_base: String,
}

impl S3ObjectStore {
    /// Create from explicit configuration
    pub fn new(
        bucket_name: String,
        region: String,
        access_key: String,
        secret_key: String,
        public_url_base: String,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let region = if let Some(ep) = endpoint {
            Region::Custom {
                region: region.clone(),
                endpoint: ep,
            }
        } else {
            Region::from_str(&region)
                .map_err(|e| AppError::configuration(format!("Invalid region: {}", e)))?
        };

        let credentials = Credentials::new(Some(access_key.as_str()), Some(secret_key.as_str()), None, None, None)
            .map_err(|e| AppError::configuration(format!("Credentials error: {}", e)))?;

        let mut bucket = Bucket::new(&bucket_name, region, credentials)
            .map_err(|e| AppError::configuration(format!("Bucket creation failed: {}", e)))?;

        // Use path-style for compatibility with MinIO/LocalStack
        bucket = bucket.with_path_style();

        Ok(Self {
            bucket: *bucket,
            public_url_base,
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url_base.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_image(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| AppError::upload_failed(format!("S3 upload failed: {}", e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            let body = String::from_utf8_lossy(response.bytes());
            return Err(AppError::upload_failed(format!(
                "S3 upload rejected ({}): {}",
                status,
                body.trim()
            ))
            .with_details(serde_json::json!({ "status": status })));
        }

        Ok(self.public_url(key))
    }
}

// ============================================================================
// Image stager
// ============================================================================

#[derive(Debug, Clone)]
pub struct StagingLimits {
    pub max_bytes: usize,
    pub timeout: Duration,
}

/// Uploads the attached image, if any, and returns its public URL.
pub async fn stage_image(
    store: &dyn ObjectStore,
    image: Option<&ImageUpload>,
    limits: &StagingLimits,
) -> Result<Option<String>> {
    let Some(image) = image else {
        return Ok(None);
    };

    let format = validate_image(&image.data, limits.max_bytes)?;
    let key = object_key(&image.data, format);
    let content_type = format.to_mime_type();

    log::info!(
        "☁️  Uploading image {:?} ({} bytes, {}) as {}",
        image.filename.as_deref().unwrap_or("<unnamed>"),
        image.data.len(),
        content_type,
        key
    );

    let started = Instant::now();
    let url = tokio::time::timeout(
        limits.timeout,
        store.put_image(&key, image.data.clone(), content_type),
    )
    .await
    .map_err(|_| {
        AppError::upload_failed(format!("Upload timed out after {:?}", limits.timeout))
    })??;

    log::info!("✅ Image staged in {:?}: {}", started.elapsed(), url);
    Ok(Some(url))
}

/// Size check plus magic-byte sniffing; nothing is decoded.
pub fn validate_image(data: &Bytes, max_bytes: usize) -> Result<ImageFormat> {
    if data.len() > max_bytes {
        return Err(AppError::upload_failed(format!(
            "Image too large ({} bytes, max {})",
            data.len(),
            max_bytes
        )));
    }

    image::guess_format(data)
        .map_err(|e| AppError::upload_failed(format!("Invalid image: {}", e)))
}

/// `images/YYYY/MM/DD/<uuid>/<sha256>.<ext>`
pub fn object_key(data: &Bytes, format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    format!(
        "images/{}/{}/{}.{}",
        chrono::Utc::now().format("%Y/%m/%d"),
        Uuid::now_v7(),
        compute_hash(data),
        extension
    )
}

/// Compute SHA256 hash
fn compute_hash(data: &Bytes) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
