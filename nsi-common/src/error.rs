//! Common error types for the NSI client library

use thiserror::Error;

/// Common result type for NSI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the backend client, repositories and binaries
#[derive(Error, Debug)]
pub enum Error {
    /// Network or protocol failure below HTTP status level (wraps reqwest::Error)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// RPC envelope carried an application error.
    ///
    /// Displays the server-supplied message verbatim.
    #[error("{message}")]
    Rpc { method: String, message: String },

    /// Login rejected or answered with an unrecognised body
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response had no usable shape for the requested operation
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an RPC error, falling back to the generic message when the
    /// server supplied none
    pub fn rpc(method: &str, message: Option<String>) -> Self {
        Error::Rpc {
            method: method.to_string(),
            message: message.unwrap_or_else(|| format!("RPC {} failed", method)),
        }
    }
}
