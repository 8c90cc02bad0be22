use axum::{http::header, response::IntoResponse, Json};
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::observability::render_metrics;

/// Banner returned by `GET /`.
pub const SERVICE_BANNER: &str = "Gemini Live Chatbot API";

pub async fn root() -> Json<Value> {
    Json(json!({ "message": SERVICE_BANNER }))
}

/// Liveness probe. The service holds no connections of its own to check.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "live-relay-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
}

pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Not Found"))
}
