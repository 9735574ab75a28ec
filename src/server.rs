//! HTTP façade: routes, JSON envelopes and cross-origin policy.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /upload`, `POST /api/upload` | screenshot → profile record |
//! | `GET /`, `GET /health` | liveness |
//!
//! Every response body, success or failure, has the same envelope:
//! `{ success, data?, error?, details? }`.

use crate::config::{CorsPolicy, ServiceConfig};
use crate::error::ProfileOcrError;
use crate::pipeline::extract::ProfileRecord;
use crate::pipeline::intake;
use crate::pipeline::ocr::OcrEngine;
use crate::process::{self, RequestTracker};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<dyn OcrEngine>,
    config: ServiceConfig,
}

impl AppState {
    pub fn new(engine: Arc<dyn OcrEngine>, config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner { engine, config }),
        }
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.inner.engine.as_ref()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProfileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiResponse {
    pub fn ok(record: ProfileRecord) -> Self {
        Self {
            success: true,
            data: Some(record),
            error: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            details,
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
}

impl IntoResponse for ProfileOcrError {
    fn into_response(self) -> Response {
        let status = if self.kind().is_intake() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ApiResponse::failure(self.public_message(), self.details());
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().body_limit();
    let cors = cors_layer(&state.config().cors);

    let upload_routes = Router::new()
        .route("/upload", post(upload))
        .route("/api/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(upload_routes)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS layer for the configured policy.
///
/// Origins that fail to parse were already rejected by the config builder and
/// are skipped here.
pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match policy {
        CorsPolicy::Any => layer.allow_origin(tower_http::cors::Any),
        CorsPolicy::AllowList(_) => layer
            .allow_origin(AllowOrigin::list(policy.header_values().unwrap_or_default()))
            .allow_credentials(true),
    }
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, ProfileOcrError> {
    let config = state.config();
    let tracker = RequestTracker::start(config);

    // A body that is not multipart at all carries no file.
    let upload = match multipart {
        Ok(mut multipart) => {
            match intake::read_upload(&mut multipart, &config.file_field, config.max_upload_bytes)
                .await
            {
                Ok(upload) => upload,
                Err(e) => return Err(tracker.fail(e)),
            }
        }
        Err(rejection) => {
            tracing::debug!("Upload without multipart body: {}", rejection.body_text());
            None
        }
    };

    let record = process::run(tracker, state.engine(), config, upload).await?;
    Ok(Json(ApiResponse::ok(record)))
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

async fn not_found() -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::failure("Not found", None)))
}

async fn method_not_allowed() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiResponse::failure("Method not allowed", None)),
    )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("Handler panicked: {}", detail);
    ProfileOcrError::Internal(detail).into_response()
}
