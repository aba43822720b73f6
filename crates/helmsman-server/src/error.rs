use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use helmsman_engine::EngineError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced through the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("application not found: {0}")]
    NotFound(String),

    #[error("application already registered: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotRegistered(name) => Self::NotFound(name),
            EngineError::AlreadyRegistered(name) => Self::Conflict(name),
            EngineError::Configuration(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
