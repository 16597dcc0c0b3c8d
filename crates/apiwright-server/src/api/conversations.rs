// ABOUTME: Conversation handlers: create a conversation and list its recent messages.
// ABOUTME: Messages come back oldest first so a chat surface can rehydrate in order.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use apiwright_agent::{ListOptions, Message};

use super::{ApiError, check_conversation_id};
use crate::app_state::SharedState;

/// How many messages a conversation view is rehydrated with.
pub const HISTORY_LIMIT: u32 = 30;

#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    pub conversation_id: String,
}

/// POST /api/conversations - Start a new conversation.
pub async fn create_conversation(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<CreateConversationResponse>), ApiError> {
    let conversation_id = state.transport.create_conversation().await?;
    tracing::info!(conversation_id = %conversation_id, "conversation created");
    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse { conversation_id }),
    ))
}

/// GET /api/conversations/{id}/messages - The latest messages, oldest first.
pub async fn list_messages(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let conversation_id = check_conversation_id(&id)?;
    let mut messages = state
        .transport
        .list_messages(conversation_id, ListOptions::latest(HISTORY_LIMIT))
        .await?;
    messages.reverse();
    Ok(Json(messages))
}
