use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use agora_chat::ChatError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps the domain taxonomy to stable `{status, code, message}` triples.
/// Internal errors are logged with full detail and degrade to a generic
/// message so nothing leaks to the client.
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ChatError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            ChatError::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            ChatError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            ChatError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ChatError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            ChatError::Internal(e) => {
                error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({
            "code": self.0.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
