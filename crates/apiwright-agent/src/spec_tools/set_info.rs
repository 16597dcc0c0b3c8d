// ABOUTME: Set-Info tool: replaces the document's info section.
// ABOUTME: Title and version are required; the change is saved through the gate right away.

use apiwright_core::{DocumentCommand, DocumentHandle};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct SetInfoTool {
    document: DocumentHandle,
}

impl SetInfoTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for SetInfoTool {
    fn id(&self) -> ToolId {
        ToolId::SetInfo
    }

    fn description(&self) -> &str {
        "Replace the API's info section: title, version, description, contact, and license."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "info": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "version": { "type": "string" },
                        "description": { "type": "string" },
                        "termsOfService": { "type": "string" },
                        "contact": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "url": { "type": "string" },
                                "email": { "type": "string" }
                            }
                        },
                        "license": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "identifier": { "type": "string" },
                                "url": { "type": "string" }
                            },
                            "required": ["name"]
                        }
                    },
                    "required": ["title", "version"]
                }
            },
            "required": ["info"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let value = params
            .get("info")
            .ok_or_else(|| ToolError::InvalidArguments("info: required object".to_string()))?;
        let info = shape::info(value)?;
        let saved = self
            .document
            .apply_and_save(DocumentCommand::SetInfo(Box::new(info)))
            .await?;
        Ok(saved_result("Info", saved))
    }
}
