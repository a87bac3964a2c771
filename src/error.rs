//! Engine error types and HTTP response mapping

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Errors surfaced by the engine, store and API layers.
///
/// The variants form a closed taxonomy so callers can match exhaustively
/// instead of inspecting strings:
/// - `Validation`: bad input shape/values (rejected per-item where possible)
/// - `NotFound`: referencing a nonexistent task or user row
/// - `UnknownUser`: stats row missing for a user id - distinct from
///   `NotFound` because it indicates a provisioning gap upstream
/// - `Conflict`: attempt to process a day earlier than the last processed day
/// - `Storage`: persistence unavailable - retryable by the caller
#[derive(Debug)]
pub enum EngineError {
    Validation(String),
    NotFound(String),
    UnknownUser(i64),
    Conflict(String),
    Storage(String),
}

impl EngineError {
    /// Stable machine-readable code carried in the JSON error body
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::NotFound(_) => "not_found",
            EngineError::UnknownUser(_) => "unknown_user",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) => "storage_unavailable",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation error: {}", msg),
            EngineError::NotFound(msg) => write!(f, "not found: {}", msg),
            EngineError::UnknownUser(id) => write!(f, "no stats for user {}", id),
            EngineError::Conflict(msg) => write!(f, "conflict: {}", msg),
            EngineError::Storage(msg) => write!(f, "storage unavailable: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

// Pool and SQLite failures are both "persistence unavailable" from the
// caller's point of view: surface them as the retryable variant.
impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for EngineError {
    fn from(e: r2d2::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) | EngineError::UnknownUser(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        tracing::error!("API error: {} - {}", status, self);

        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            EngineError::Validation("x".into()),
            EngineError::NotFound("x".into()),
            EngineError::UnknownUser(1),
            EngineError::Conflict("x".into()),
            EngineError::Storage("x".into()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 5);
    }
}
