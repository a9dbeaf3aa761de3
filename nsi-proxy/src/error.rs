//! Error types for nsi-proxy

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Proxy error type
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No backend origin configured (500)
    #[error("BACKEND_BASE is not set")]
    Unconfigured,

    /// Upstream unreachable or its response unreadable (502)
    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    /// Request body could not be read (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Config(#[from] nsi_common::Error),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ProxyError::Unconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
            ProxyError::BadGateway(detail) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Bad Gateway", "detail": detail }),
            ),
            ProxyError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ProxyError::Config(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            ProxyError::Client(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for proxy handlers
pub type ProxyResult<T> = Result<T, ProxyError>;
