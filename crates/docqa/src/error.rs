//! Error types for the question-answering pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document source failure (aborts an index build)
    #[error("Document source error: {0}")]
    Source(String),

    /// Text extraction failed for one document
    #[error("Failed to extract '{file_name}': {message}")]
    Extraction { file_name: String, message: String },

    /// Chunking failed for one document
    #[error("Failed to chunk '{file_name}': {message}")]
    Chunking { file_name: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Non-2xx response from an upstream service
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: String,
        status: u16,
        body: String,
    },

    /// A request exceeded its deadline
    #[error("{0} timed out")]
    Timeout(String),

    /// A 2xx response whose body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Generation backend error
    #[error("Generation error: {0}")]
    Generation(String),

    /// No index has been published yet
    #[error("Pipeline not ready: {0}")]
    NotReady(String),

    /// Request rejected before reaching the pipeline
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    /// Create a chunking error
    pub fn chunking(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chunking {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an upstream status error
    pub fn upstream(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a retry of the same request may succeed.
    ///
    /// Connection failures, timeouts and non-2xx statuses are transient; a
    /// response that parsed as success but lacks the expected payload is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Upstream { .. } | Self::Timeout(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::NotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::Source(_) => (StatusCode::INTERNAL_SERVER_ERROR, "source_error"),
            Error::Extraction { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "extraction_error"),
            Error::Chunking { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "chunking_error"),
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::Upstream { .. } | Error::Http(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::MalformedResponse(_) => (StatusCode::BAD_GATEWAY, "malformed_response"),
            Error::Generation(_) => (StatusCode::SERVICE_UNAVAILABLE, "generation_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Toml(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::Io(_) | Error::Database(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
