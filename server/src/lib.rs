pub mod compose;
pub mod config;
pub mod error;
pub mod policy;
pub mod provider;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use ta_core::SnapshotHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::compose::{AnswerComposer, AnswerResult};
use crate::config::CorpusSource;
use crate::error::AppError;
use crate::provider::ImageAttachment;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    /// Base64 image; only used together with `mime_type`.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub mime_type: String,
}

impl QuestionRequest {
    fn attachment(&self) -> Result<Option<ImageAttachment>, AppError> {
        if self.image.trim().is_empty() || self.mime_type.trim().is_empty() {
            return Ok(None);
        }
        ImageAttachment::from_base64(&self.image, &self.mime_type)
            .map(Some)
            .map_err(|e| AppError::InvalidImage(e.to_string()))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub snapshot: SnapshotHandle,
    pub composer: Arc<AnswerComposer>,
    pub top_n: usize,
}

impl AppState {
    pub fn new(snapshot: SnapshotHandle, composer: AnswerComposer, top_n: usize) -> Self {
        Self { snapshot, composer: Arc::new(composer), top_n }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api", post(answer_handler).options(preflight).fallback(method_not_allowed))
        .route("/api/", post(answer_handler).options(preflight).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
fn cors_layer() -> CorsLayer {
    let any = || CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                any()
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any(),
    }
}

pub async fn answer_handler(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, AppError> {
    let Json(req) = payload?;
    let image = req.attachment()?;
    let start = std::time::Instant::now();

    // hold one snapshot for the whole request, even if a reload lands meanwhile
    let snapshot = state.snapshot.current();
    let top_n = state.top_n;
    let result = state
        .composer
        .answer(&req.question, image.as_ref(), |query| snapshot.rank(query, top_n))
        .await?;

    tracing::info!(
        image = image.is_some(),
        links = result.links.len(),
        took_ms = start.elapsed().as_millis() as u64,
        "answered question"
    );
    Ok(Json(result))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Rebuild the snapshot from `source` off the async runtime and publish it.
/// On failure the current snapshot stays in place.
pub async fn reload(handle: &SnapshotHandle, source: CorpusSource) -> Result<()> {
    let next = tokio::task::spawn_blocking(move || source.load()).await??;
    handle.replace(next);
    Ok(())
}
