pub mod error;
pub mod handlers;
pub mod inference;
pub mod init;
pub mod models;
pub mod payload;
pub mod pipeline;
pub mod prompt;
pub mod storage;

pub use crate::handlers::AppState;
pub use crate::pipeline::{AskPipeline, PipelineSettings};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{ask_handler, health_check};

pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ask-mistral", axum::routing::post(ask_handler))
        .route("/health", axum::routing::get(health_check))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
