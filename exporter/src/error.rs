//! Error types for exporter startup and HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use portwatch_core::ConfigError;
use portwatch_enrich::EnrichError;
use portwatch_targets::TargetError;
use serde::Serialize;
use thiserror::Error;

/// Failure while assembling the exporter from configuration.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("target source error: {0}")]
    Targets(#[from] TargetError),

    #[error("enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("invalid listen address '{address}': {reason}")]
    ListenAddress { address: String, reason: String },

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializable error body for HTTP responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Error code for clients (e.g., "ENRICHMENT_DISABLED")
    pub code: String,
    /// Human readable message
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
