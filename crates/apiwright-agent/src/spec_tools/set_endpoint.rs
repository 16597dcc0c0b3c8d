// ABOUTME: Set-Endpoint-Operation tool: upserts or removes one operation at a path and method.
// ABOUTME: An absent, null, or empty operation deletes the operation.

use apiwright_core::{DocumentCommand, DocumentHandle, HttpMethod};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct SetEndpointOperationTool {
    document: DocumentHandle,
}

impl SetEndpointOperationTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for SetEndpointOperationTool {
    fn id(&self) -> ToolId {
        ToolId::SetEndpointOperation
    }

    fn description(&self) -> &str {
        "Create, replace, or delete the operation for one path and HTTP method. Omit `operation` (or pass {}) to delete it."
    }

    fn schema(&self) -> Value {
        let methods: Vec<&str> = HttpMethod::ALL.iter().map(|m| m.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path template starting with '/', e.g. /users/{userId}."
                },
                "method": {
                    "type": "string",
                    "enum": methods,
                    "description": "HTTP method (case-insensitive)."
                },
                "operation": {
                    "type": "object",
                    "description": "The full operation object. Replaces any existing operation.",
                    "properties": {
                        "operationId": { "type": "string" },
                        "tags": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                        "summary": { "type": "string" },
                        "description": { "type": "string" },
                        "parameters": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "in": { "type": "string", "enum": ["query", "header", "path", "cookie"] },
                                    "$ref": { "type": "string" }
                                }
                            }
                        },
                        "requestBody": { "type": "object" },
                        "responses": {
                            "type": "object",
                            "description": "Keyed by status code (200, 4XX) or 'default'."
                        },
                        "x-implementation-details": {
                            "type": "string",
                            "description": "Notes on how the endpoint should be implemented."
                        }
                    },
                    "required": ["operationId", "tags", "summary", "description", "responses"]
                }
            },
            "required": ["path", "method"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let path = shape::path(&params)?;
        let method = shape::method(&params)?;
        let subject = format!("Operation {} {path}", method.as_str().to_ascii_uppercase());

        let command = match shape::present(params.get("operation")) {
            None => DocumentCommand::RemoveOperation { path, method },
            Some(value) => DocumentCommand::UpsertOperation {
                path,
                method,
                operation: Box::new(shape::operation(value)?),
            },
        };

        let saved = self.document.apply_and_save(command).await?;
        Ok(saved_result(&subject, saved))
    }
}
