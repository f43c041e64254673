//! Error types for the citation server
//!
//! One tagged error kind per failure class, carrying a message and, where
//! one exists, the underlying cause. Client-facing bodies stay generic;
//! diagnostic detail goes to the log sink only.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::engine::EngineError;
use crate::styles::StyleError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Application error type
#[derive(Error, Debug)]
pub enum ServiceError {
    /// POSTed body was not parseable JSON. Recovered at the boundary; the
    /// pipeline never starts.
    #[error("could not parse POSTed data: {0}")]
    Parse(String),

    /// Request shape is invalid (item id mismatch, missing clusters).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Style resolution or fetch failed.
    #[error("style resolution failed: {0}")]
    Resolution(#[from] StyleError),

    /// Engine construction or execution failed.
    #[error("formatting failed: {0}")]
    Formatting(#[from] EngineError),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing body. Fixed text for the body-parse rejection, which
    /// clients already match on; generic for everything else.
    fn body(&self) -> &'static str {
        match self {
            ServiceError::Parse(_) => "Could not parse POSTed data",
            _ => "An error occurred",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            ServiceError::Parse(msg) => tracing::debug!("rejected request body: {}", msg),
            ServiceError::Validation(msg) => tracing::error!("invalid request: {}", msg),
            ServiceError::Resolution(e) => tracing::error!("style resolution failed: {}", e),
            ServiceError::Formatting(e) => tracing::error!("formatting failed: {}", e),
        }
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain")],
            self.body(),
        )
            .into_response()
    }
}
