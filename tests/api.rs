use async_trait::async_trait;
use bytes::Bytes;
use geoscope_relay::error::{AppError, Result};
use geoscope_relay::inference::InferenceService;
use geoscope_relay::prompt::{ContentBlock, MultimodalMessage};
use geoscope_relay::storage::{ObjectStore, StagingLimits};
use geoscope_relay::{AppState, AskPipeline, PipelineSettings, create_app_router};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MODEL: &str = "meta-llama/Llama-4-Scout-17B-16E-Instruct";
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0];
const MAX_IMAGE_BYTES: usize = 64 * 1024;
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Default)]
struct MemoryStore {
    puts: Mutex<Vec<(String, Bytes)>>,
    reject: bool,
}

impl MemoryStore {
    fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_image(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String> {
        if self.reject {
            return Err(AppError::upload_failed("S3 upload rejected (403): AccessDenied"));
        }
        self.puts.lock().unwrap().push((key.to_string(), data));
        Ok(format!("https://cdn.test/{}", key))
    }
}

#[derive(Default)]
struct ScriptedModel {
    reply: Option<String>,
    seen: Mutex<Vec<MultimodalMessage>>,
}

#[async_trait]
impl InferenceService for ScriptedModel {
    async fn complete(&self, _model: &str, message: &MultimodalMessage) -> Result<Option<String>> {
        self.seen.lock().unwrap().push(message.clone());
        Ok(self.reply.clone())
    }
}

async fn spawn(store: Arc<MemoryStore>, model: Arc<ScriptedModel>) -> String {
    let pipeline = AskPipeline::new(
        store,
        model,
        PipelineSettings {
            model: MODEL.to_string(),
            staging: StagingLimits {
                max_bytes: MAX_IMAGE_BYTES,
                timeout: Duration::from_secs(2),
            },
            inference_timeout: Duration::from_secs(2),
        },
    );
    let state = Arc::new(AppState {
        pipeline,
        max_body_bytes: MAX_BODY_BYTES,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_app_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn ask(base: &str, form: Form) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/ask-mistral", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn text_question_returns_answer() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel {
        reply: Some("\nLow NDVI suggests sparse canopy.\n".to_string()),
        ..Default::default()
    });
    let base = spawn(store.clone(), model.clone()).await;

    let form = Form::new()
        .text("prompt", "Why is vegetation sparse here?")
        .text("metrics", r#"{"lat":12.9,"lon":77.6,"ndvi":0.18}"#);
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["model"], MODEL);
    assert!(body["imageUsed"].is_null());
    assert_eq!(body["answer"], "Low NDVI suggests sparse canopy.");

    let seen = model.seen.lock().unwrap();
    let ContentBlock::Text { text } = &seen[0].user().content[0] else {
        panic!("text block expected first");
    };
    assert!(text.contains("Latitude: 12.9"));
    assert!(text.contains("Rainfall (Annual): not available mm"));
    assert!(!seen[0].has_image());
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn image_is_uploaded_and_reported() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel {
        reply: Some("Field report.".to_string()),
        ..Default::default()
    });
    let base = spawn(store.clone(), model.clone()).await;

    let image = Part::bytes(PNG.to_vec())
        .file_name("tile.png")
        .mime_str("image/png")
        .unwrap();
    let form = Form::new().text("prompt", "Describe the land cover").part("image", image);
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 200);
    let url = body["imageUsed"].as_str().unwrap();
    assert!(url.starts_with("https://cdn.test/images/"));
    assert_eq!(store.put_count(), 1);

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen[0].user().content.last(), Some(&ContentBlock::image_url(url)));
}

#[tokio::test]
async fn malformed_metrics_is_client_error() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel::default());
    let base = spawn(store.clone(), model.clone()).await;

    let form = Form::new().text("metrics", "{\"lat\": ");
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid request payload");
    assert!(body["details"].as_str().unwrap().contains("JSON"));
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_failure_is_server_error() {
    let store = Arc::new(MemoryStore {
        reject: true,
        ..Default::default()
    });
    let model = Arc::new(ScriptedModel::default());
    let base = spawn(store, model.clone()).await;

    let form = Form::new().part("image", Part::bytes(PNG.to_vec()).file_name("tile.png"));
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Something went wrong");
    assert!(body["details"].as_str().unwrap().contains("AccessDenied"));
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_model_reply_falls_back() {
    let base = spawn(Arc::new(MemoryStore::default()), Arc::new(ScriptedModel::default())).await;

    let (status, body) = ask(&base, Form::new().text("prompt", "")).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["answer"], "No response received.");
}

#[tokio::test]
async fn empty_image_part_counts_as_no_image() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel {
        reply: Some("Text only.".to_string()),
        ..Default::default()
    });
    let base = spawn(store.clone(), model.clone()).await;

    let form = Form::new()
        .text("prompt", "Is this wetland?")
        .part("image", Part::bytes(Vec::new()).file_name("empty.png"));
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 200);
    assert!(body["imageUsed"].is_null());
    assert_eq!(store.put_count(), 0);
    assert!(!model.seen.lock().unwrap()[0].has_image());
}

#[tokio::test]
async fn second_image_part_is_ignored() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel {
        reply: Some("One image seen.".to_string()),
        ..Default::default()
    });
    let base = spawn(store.clone(), model.clone()).await;

    let form = Form::new()
        .part("image", Part::bytes(PNG.to_vec()).file_name("first.png"))
        .part("image", Part::bytes(JPEG.to_vec()).file_name("second.jpg"));
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 200);
    let puts = store.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1.as_ref(), PNG);
    assert!(puts[0].0.ends_with(".png"));
    assert_eq!(body["imageUsed"], format!("https://cdn.test/{}", puts[0].0));

    let seen = model.seen.lock().unwrap();
    let images = seen[0].user().content.iter().filter(|b| b.is_image()).count();
    assert_eq!(images, 1);
}

#[tokio::test]
async fn image_over_body_limit_is_upload_failure() {
    let store = Arc::new(MemoryStore::default());
    let model = Arc::new(ScriptedModel::default());
    let base = spawn(store.clone(), model.clone()).await;

    let mut data = PNG.to_vec();
    data.resize(2 * MAX_BODY_BYTES, 0);
    let form = Form::new().part("image", Part::bytes(data).file_name("huge.png"));
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Something went wrong");
    assert!(body["details"].as_str().unwrap().contains("Image too large"));
    assert_eq!(store.put_count(), 0);
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn image_over_image_limit_is_upload_failure() {
    let store = Arc::new(MemoryStore::default());
    let base = spawn(store.clone(), Arc::new(ScriptedModel::default())).await;

    let mut data = PNG.to_vec();
    data.resize(MAX_IMAGE_BYTES + 1, 0);
    let form = Form::new().part("image", Part::bytes(data).file_name("big.png"));
    let (status, body) = ask(&base, form).await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], "Something went wrong");
    assert!(body["details"].as_str().unwrap().contains("Image too large"));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn non_multipart_body_gets_envelope() {
    let model = Arc::new(ScriptedModel::default());
    let base = spawn(Arc::new(MemoryStore::default()), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/ask-mistral", base))
        .json(&serde_json::json!({ "prompt": "Why is it dry?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid request payload");
    assert!(body["details"].as_str().unwrap().starts_with("Multipart"));
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_model() {
    let base = spawn(Arc::new(MemoryStore::default()), Arc::new(ScriptedModel::default())).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], MODEL);
}
