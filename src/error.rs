//! Error type for the HTTP layer.
//!
//! [`ApiError`] unifies store, session and request failures and renders them
//! as `{ "error": ..., "status": ... }` JSON via [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::content::ContentError;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("login required")]
    Unauthorized,

    #[error("admin access required")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::EraNotFound(_) | ContentError::TopicNotFound(_) | ContentError::EventNotFound { .. } => {
                Self::NotFound(e.to_string())
            }
            ContentError::IndexOutOfRange { .. } => Self::BadRequest(e.to_string()),
            ContentError::InvalidImport(msg) => Self::BadRequest(format!("Import failed: {msg}")),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::UnknownSession => Self::Unauthorized,
            SessionError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(target: "chronicle_backend", error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
