//! Conversion of domain errors into HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::chat::error::ChatError;
use crate::users::error::UserError;

/// Error response rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Human-readable message.
    pub detail: String,
}

impl ApiError {
    /// Build an error response.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// 422 for a rejected request field.
    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), detail = %self.detail, "request failed");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::EmptyMessage => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::ExternalCall(call) if call.is_unavailable() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ChatError::ExternalCall(_) | ChatError::ToolLoopExceeded { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ChatError::Conversation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        let status = match &err {
            UserError::DuplicateEmail(_) => StatusCode::CONFLICT,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UserError::PasswordHash(_)
            | UserError::Task(_)
            | UserError::Sqlite(_)
            | UserError::TokioSqlite(_)
            | UserError::Regex(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}
