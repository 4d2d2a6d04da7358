use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use guardian_core::ConfigIssue;
use guardian_engine::EngineError;
use guardian_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The guard's directory entry cannot support the request; contact an
    /// administrator rather than retry.
    #[error("Configuration error: {0}")]
    Configuration(ConfigIssue),

    /// Transient store failure; retry the whole operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Configuration(issue) => ServerError::Configuration(issue),
            EngineError::Store(err) => ServerError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        ServerError::StoreUnavailable(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Configuration(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::StoreUnavailable(_) => {
                tracing::error!(error = %self, "store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ServerError::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
