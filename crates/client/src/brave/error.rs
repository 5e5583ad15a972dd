//! Brave API client error types.

use std::sync::Arc;

use labelgate_core::{Error, RetryableError};

/// Errors from Brave Search API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BraveError {
    /// No API key configured.
    #[error("missing API key: LABELGATE_BRAVE_API_KEY not set")]
    MissingApiKey,

    /// Invalid search query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid count parameter (must be 1-20).
    #[error("invalid count: must be 1-20")]
    InvalidCount,

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by Brave API.
    #[error("rate limited: too many requests")]
    RateLimited { request_id: Option<String> },

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16, request_id: Option<String> },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BraveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BraveError::Timeout } else { BraveError::Network(Arc::new(err)) }
    }
}

impl RetryableError for BraveError {
    fn status(&self) -> Option<u16> {
        match self {
            BraveError::RateLimited { .. } => Some(429),
            BraveError::HttpError { status, .. } => Some(*status),
            BraveError::AuthError => Some(401),
            _ => None,
        }
    }

    fn trace_id(&self) -> Option<&str> {
        match self {
            BraveError::RateLimited { request_id } | BraveError::HttpError { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

impl From<BraveError> for Error {
    fn from(err: BraveError) -> Self {
        match err {
            BraveError::MissingApiKey | BraveError::AuthError => Error::SearchAuthError(err.to_string()),
            BraveError::RateLimited { .. } => Error::SearchRateLimited(err.to_string()),
            BraveError::InvalidQuery(_) | BraveError::InvalidCount => Error::InvalidInput(err.to_string()),
            BraveError::HttpError { status, ref request_id } => Error::HttpError {
                status: Some(status),
                message: err.to_string(),
                trace_id: request_id.clone(),
            },
            BraveError::Timeout | BraveError::Network(_) | BraveError::Parse(_) => Error::http(err.to_string()),
        }
    }
}
