// src/utils/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::gateway::models::ErrorResponse;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to open image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to run OCR engine '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Failed to extract text from page {page}: {message}")]
    Extraction { page: u32, message: String },

    #[error("OCR failed on page {page}: {source}")]
    Ocr {
        page: u32,
        #[source]
        source: OcrError,
    },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No tables found")]
    NoTables,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Everything a single `/extract/` request can fail with.
///
/// `InvalidInput` and `Rejected` are the client's fault and map to 4xx; every other
/// variant is a processing failure and maps to 500 with the underlying message.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tables(#[from] ExtractError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Extraction failed: {}", self);
        } else {
            tracing::warn!("Rejected extraction request: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("HTTP client setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
