// ABOUTME: API module containing the HTTP handlers for conversations, assistant turns, and documents.
// ABOUTME: Also defines ApiError, the JSON error response shared by every handler.

pub mod assistant;
pub mod conversations;
pub mod specs;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use apiwright_agent::TransportError;
use apiwright_core::{ActorError, PersistenceError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("storage error: {0}")]
    Storage(#[from] PersistenceError),

    #[error("document error: {0}")]
    Document(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ActorError),

    #[error("model transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidConversationId(_) | ApiError::EmptyMessage => StatusCode::BAD_REQUEST,
            ApiError::Document(StoreError::NotLoaded) => StatusCode::NOT_FOUND,
            ApiError::Transport(TransportError::RunActive { .. }) => StatusCode::CONFLICT,
            ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) | ApiError::Validation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Conversation ids become storage keys and URL segments, so keep them to a safe alphabet.
pub fn check_conversation_id(id: &str) -> Result<&str, ApiError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(id)
    } else {
        Err(ApiError::InvalidConversationId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_ids_are_restricted() {
        assert!(check_conversation_id("thread_abc123").is_ok());
        assert!(check_conversation_id("conv-1").is_ok());
        assert!(check_conversation_id("").is_err());
        assert!(check_conversation_id("../etc/passwd").is_err());
        assert!(check_conversation_id("a b").is_err());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            ApiError::InvalidConversationId("x y".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Transport(TransportError::RunActive {
                conversation_id: "c".into()
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Transport(TransportError::Http("refused".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
