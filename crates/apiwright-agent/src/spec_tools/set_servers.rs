// ABOUTME: Set-Server tool: replaces the document's server list. An empty list clears it.
// ABOUTME: Each server needs a non-empty url; variables and descriptions pass through unchanged.

use apiwright_core::{DocumentCommand, DocumentHandle};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct SetServersTool {
    document: DocumentHandle,
}

impl SetServersTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for SetServersTool {
    fn id(&self) -> ToolId {
        ToolId::SetServers
    }

    fn description(&self) -> &str {
        "Replace the list of servers the API is served from. Pass an empty list to remove all servers."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "servers": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "url": { "type": "string" },
                            "description": { "type": "string" },
                            "variables": { "type": "object" }
                        },
                        "required": ["url"]
                    }
                }
            },
            "required": ["servers"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let servers = shape::servers(params.get("servers"))?;
        let subject = if servers.is_empty() {
            "Server list (now empty)".to_string()
        } else {
            format!("Server list ({} entries)", servers.len())
        };
        let saved = self
            .document
            .apply_and_save(DocumentCommand::SetServers(servers))
            .await?;
        Ok(saved_result(&subject, saved))
    }
}
