// src/gateway/routes.rs
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use super::models::{ExtractionRequest, ExtractionResult, Upload};
use super::Gateway;
use crate::utils::GatewayError;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Builds the HTTP surface: `POST /extract/` (with or without the trailing slash) and
/// `GET /health`. Request bodies above `max_body_bytes` are rejected.
pub fn router(gateway: Arc<Gateway>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/extract/", post(extract_data))
        .route("/extract", post(extract_data))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn extract_data(
    State(gateway): State<Arc<Gateway>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionResult>, GatewayError> {
    let multipart = multipart.map_err(|e| {
        GatewayError::invalid(format!("Expected a multipart form: {}", e.body_text()))
    })?;

    let request = read_form(multipart).await?;
    let result = gateway.handle(request).await?;
    Ok(Json(result))
}

/// Keeps the reader's status, so an oversized body stays a 413.
fn unreadable(e: MultipartError) -> GatewayError {
    GatewayError::Rejected {
        status: e.status(),
        message: format!("Failed to read multipart form: {}", e.body_text()),
    }
}

/// Collects `source_type`, `file` and `url`; other fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<ExtractionRequest, GatewayError> {
    let mut request = ExtractionRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "source_type" => request.source_type = Some(field.text().await.map_err(unreadable)?),
            "url" => request.url = Some(field.text().await.map_err(unreadable)?),
            "file" => {
                let filename = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(unreadable)?;
                tracing::debug!("Received upload {:?} ({} bytes)", filename, bytes.len());
                request.file = Some(Upload { filename, bytes });
            }
            other => tracing::debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(request)
}
