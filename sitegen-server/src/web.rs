//! HTTP routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use sitegen_pipeline::{PipelineController, PreviewRequest, PreviewResponse};

/// How much of an unparseable body is echoed back in the 400.
const BODY_ECHO_BYTES: usize = 500;

pub struct AppState {
    pub controller: PipelineController,
}

impl AppState {
    pub fn new(controller: PipelineController) -> Arc<Self> {
        Arc::new(Self { controller })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/_health", get(health))
        .route("/generate_preview", post(generate_preview))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error with a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn generate_preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PreviewResponse>, ApiError> {
    let request = parse_request(&body)?;
    tracing::info!(project_name = %request.project_name(), "generate_preview");

    match state.controller.run(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) if e.is_client_error() => Err(ApiError::bad_request(e.to_string())),
        Err(e) => {
            tracing::error!(project_name = %request.project_name(), error = %e, "Preview generation failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

/// Decode and check a request body. Checks run in order: JSON syntax, object
/// shape, then `projectName`. Other fields are passed on as sent.
pub fn parse_request(body: &[u8]) -> Result<PreviewRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| {
        let head = &body[..body.len().min(BODY_ECHO_BYTES)];
        ApiError::bad_request(format!(
            "Invalid JSON body. First {BODY_ECHO_BYTES} bytes: {}",
            String::from_utf8_lossy(head)
        ))
    })?;

    let Value::Object(fields) = value else {
        return Err(ApiError::bad_request("Body must be a JSON object"));
    };

    let request = PreviewRequest::from_fields(fields);
    if request.project_name().is_empty() {
        return Err(ApiError::bad_request("projectName is required"));
    }
    Ok(request)
}
