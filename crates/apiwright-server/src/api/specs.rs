// ABOUTME: Document preview handler: the conversation's current OpenAPI document and its diagnostics.
// ABOUTME: Servers are replaced by the configured API base URL; the stored document is untouched.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use apiwright_core::{Diagnostic, Document, Server};

use super::{ApiError, check_conversation_id};
use crate::app_state::SharedState;

#[derive(Debug, Serialize)]
pub struct SpecView {
    pub conversation_id: String,
    pub revision: u64,
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// Point the document at the preview server.
pub fn with_preview_server(mut document: Document, api_base_url: &str) -> Document {
    document.servers = vec![Server {
        url: api_base_url.to_string(),
        ..Server::default()
    }];
    document
}

/// GET /api/specs/{id} - Current document plus diagnostics.
pub async fn get_spec(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SpecView>, ApiError> {
    let conversation_id = check_conversation_id(&id)?;
    let conversation = state.conversation(conversation_id).await?;
    let handle = &conversation.session.document;

    let document = handle.document().await?;
    let diagnostics = handle.validate().await?;
    Ok(Json(SpecView {
        conversation_id: conversation_id.to_string(),
        revision: handle.revision().await,
        document: with_preview_server(document, &state.api_base_url),
        diagnostics,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_replaces_servers() {
        let mut document = Document::default();
        document.servers = vec![
            Server {
                url: "https://prod.example.com".to_string(),
                ..Server::default()
            },
            Server {
                url: "https://staging.example.com".to_string(),
                ..Server::default()
            },
        ];
        let preview = with_preview_server(document, "http://localhost:3001");
        assert_eq!(preview.servers.len(), 1);
        assert_eq!(preview.servers[0].url, "http://localhost:3001");
    }
}
