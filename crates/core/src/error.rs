//! Unified error types for labelgate.
//!
//! Every variant maps onto an MCP error code so the server can surface
//! failures without re-classifying them.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::retry::RetryableError;

/// Unified error types for the labelgate pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid hash format.
    #[error("CACHE_ERROR: invalid hash format")]
    InvalidHash,

    /// An expected column is not present in the store schema.
    #[error("SCHEMA_DRIFT: column {column} does not exist")]
    SchemaDrift { column: String },

    /// Stored payload could not be encoded or decoded.
    #[error("SERIALIZATION: {0}")]
    Serialization(String),

    /// HTTP error response from an upstream service.
    #[error("HTTP_ERROR: {message}")]
    HttpError { status: Option<u16>, message: String, trace_id: Option<String> },

    /// Search API authentication error.
    #[error("SEARCH_AUTH_ERROR: {0}")]
    SearchAuthError(String),

    /// Search API rate limited.
    #[error("SEARCH_RATE_LIMITED: {0}")]
    SearchRateLimited(String),
}

impl Error {
    /// Build an `HttpError` from a bare message.
    pub fn http(message: impl Into<String>) -> Self {
        Error::HttpError { status: None, message: message.into(), trace_id: None }
    }

    /// Classify a raw SQLite failure, turning "no such column" into `SchemaDrift`.
    pub(crate) fn classify_sqlite(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(_, Some(msg)) = &err
            && let Some(column) = missing_column(msg)
        {
            return Error::SchemaDrift { column };
        }
        Error::from(err)
    }

    /// Whether the underlying SQLite failure is a busy/locked condition.
    fn is_sqlite_busy(&self) -> bool {
        match self {
            Error::Database(tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(e, _))) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Extract the column name from a "no such column" message.
///
/// SQLite reports `no such column: updated_at`; some tables are qualified as
/// `s.updated_at`, in which case only the last segment is kept.
fn missing_column(msg: &str) -> Option<String> {
    let rest = msg.strip_prefix("no such column: ")?;
    let column = rest.rsplit('.').next().unwrap_or(rest).trim();
    if column.is_empty() { None } else { Some(column.to_string()) }
}

impl RetryableError for Error {
    fn status(&self) -> Option<u16> {
        match self {
            Error::HttpError { status, .. } => *status,
            Error::SearchRateLimited(_) => Some(429),
            _ if self.is_sqlite_busy() => Some(503),
            _ => None,
        }
    }

    fn trace_id(&self) -> Option<&str> {
        match self {
            Error::HttpError { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::InvalidHash => (-32002, "Invalid hash format".to_string()),
            Error::SchemaDrift { column } => (-32002, format!("column {column} does not exist")),
            Error::Serialization(msg) => (-32003, msg.clone()),
            Error::HttpError { message, .. } => (-32008, message.clone()),
            Error::SearchAuthError(msg) => (-32009, msg.clone()),
            Error::SearchRateLimited(msg) => (-32010, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("abc123".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("abc123".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);
    }

    #[test]
    fn test_missing_column_parsing() {
        assert_eq!(missing_column("no such column: updated_at"), Some("updated_at".to_string()));
        assert_eq!(missing_column("no such column: s.updated_at"), Some("updated_at".to_string()));
        assert_eq!(missing_column("no such table: snapshots"), None);
    }

    #[test]
    fn test_rate_limited_reports_429() {
        let err = Error::SearchRateLimited("slow down".to_string());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_http_error_carries_trace_id() {
        let err = Error::HttpError { status: Some(502), message: "bad gateway".into(), trace_id: Some("req-1".into()) };
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.trace_id(), Some("req-1"));
    }
}
