//! RE:DREAM HTTP API
//!
//! Axum server exposing the dream pipeline alongside the Unix socket IPC
//! server (port 8767 by default). Each endpoint is a thin handler over an
//! inner function that can be called directly from tests.
//!
//! Endpoints:
//! - GET  /health   health check with store status
//! - GET  /version  server version info
//! - POST /analyze  run the pipeline on a dream and store the result; the
//!   `illustration` path refers to front-end assets, not a route here
//! - GET  /records  list stored records in insertion order
//! - POST /delete   delete a record by id

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use redream_core::ipc::{RedreamRequest, RedreamResponse};
use redream_core::{DreamPipeline, RedreamConfig};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<DreamPipeline>,
    pub socket_path: String,
}

pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/analyze", post(analyze_handler))
        .route("/records", get(records_handler))
        .route("/delete", post(delete_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Shuts down gracefully when the broadcast signal fires.
pub async fn start_http_server(
    pipeline: Arc<DreamPipeline>,
    config: &RedreamConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        pipeline,
        socket_path: config.service.socket_path.clone(),
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("RE:DREAM HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub dream_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub id: Option<i64>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub async fn health_inner(
    pipeline: &DreamPipeline,
    socket_path: &str,
) -> (StatusCode, serde_json::Value) {
    match pipeline.store().describe().await {
        Ok(store) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store,
                "socket": socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "redream/1",
    })
}

pub async fn analyze_inner(
    pipeline: &DreamPipeline,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    let dream_text = match req.dream_text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return error_body(StatusCode::BAD_REQUEST, "dream_text field is required"),
    };

    let start = Instant::now();
    let response =
        crate::router::handle_request(RedreamRequest::Analyze { dream_text }, pipeline).await;
    let took_ms = start.elapsed().as_millis() as u64;

    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
            }
            (StatusCode::OK, data)
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn records_inner(pipeline: &DreamPipeline) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(RedreamRequest::List, pipeline).await;
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn delete_inner(
    pipeline: &DreamPipeline,
    req: DeleteRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(id) = req.id else {
        return error_body(StatusCode::BAD_REQUEST, "id field is required");
    };

    let response = crate::router::handle_request(RedreamRequest::Delete { id }, pipeline).await;
    match response_to_http(response) {
        Ok(data) => (delete_status(&data), data),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pipeline, &state.socket_path).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state.pipeline, req).await;
    (status, Json(body))
}

pub async fn records_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = records_inner(&state.pipeline).await;
    (status, Json(body))
}

pub async fn delete_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    let (status, body) = delete_inner(&state.pipeline, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert an IPC `RedreamResponse` into an HTTP body value, or an error string.
pub fn response_to_http(response: RedreamResponse) -> std::result::Result<serde_json::Value, String> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

/// 404 unless the router reported the record as deleted.
pub fn delete_status(data: &serde_json::Value) -> StatusCode {
    if data["deleted"].as_bool() == Some(true) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (
        status,
        serde_json::json!({
            "error": msg.into(),
            "status": "error",
        }),
    )
}
