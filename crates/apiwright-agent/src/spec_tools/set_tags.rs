// ABOUTME: Set-Global-Tags tool: replaces the document's global tag list.
// ABOUTME: An absent or empty list clears every tag.

use apiwright_core::{DocumentCommand, DocumentHandle};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct SetGlobalTagsTool {
    document: DocumentHandle,
}

impl SetGlobalTagsTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for SetGlobalTagsTool {
    fn id(&self) -> ToolId {
        ToolId::SetGlobalTags
    }

    fn description(&self) -> &str {
        "Replace the global tag list used to group operations. Omit `tags` or pass [] to clear it."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["name"]
                    }
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let tags = shape::tags(params.get("tags"))?;
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        let subject = if names.is_empty() {
            "Global tags (now empty)".to_string()
        } else {
            format!("Global tags [{}]", names.join(", "))
        };
        let saved = self
            .document
            .apply_and_save(DocumentCommand::SetTags(tags))
            .await?;
        Ok(saved_result(&subject, saved))
    }
}
