use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for breaker operations
pub type Result<T> = std::result::Result<T, BreakerError>;

/// Breaker error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakerError {
    /// The circuit is open and the payload was not forwarded
    #[error("Circuit breaker '{0}' is open")]
    OpenCircuit(String),

    /// The configured target error kind does not exist in the taxonomy
    #[error("Invalid match spec: '{0}' is not a known error kind")]
    InvalidMatchSpec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Circuit breaker not found: {0}")]
    NotFound(String),
}

impl BreakerError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BreakerError::OpenCircuit(_) => StatusCode::SERVICE_UNAVAILABLE,
            BreakerError::InvalidMatchSpec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BreakerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BreakerError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Whether this error means "circuit open, retry later"
    pub fn is_open_circuit(&self) -> bool {
        matches!(self, BreakerError::OpenCircuit(_))
    }
}

impl IntoResponse for BreakerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
