// ABOUTME: Overwrite-Specification tool: replaces the whole working document in one step.
// ABOUTME: The replacement must carry openapi 3.1.0 and a valid info section, and is saved immediately.

use apiwright_core::{DocumentCommand, DocumentHandle};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct OverwriteSpecificationTool {
    document: DocumentHandle,
}

impl OverwriteSpecificationTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for OverwriteSpecificationTool {
    fn id(&self) -> ToolId {
        ToolId::OverwriteSpecification
    }

    fn description(&self) -> &str {
        "Replace the entire OpenAPI document. Use only for large restructurings; prefer the targeted Set-* tools."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "openapi_spec": {
                    "type": "object",
                    "description": "A complete OpenAPI 3.1.0 document.",
                    "properties": {
                        "openapi": { "type": "string", "enum": ["3.1.0"] },
                        "info": { "type": "object" },
                        "servers": { "type": "array" },
                        "tags": { "type": "array" },
                        "paths": { "type": "object" },
                        "components": { "type": "object" }
                    },
                    "required": ["openapi", "info"]
                }
            },
            "required": ["openapi_spec"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let value = params.get("openapi_spec").ok_or_else(|| {
            ToolError::InvalidArguments("openapi_spec: required object".to_string())
        })?;
        let document = shape::document(value)?;
        let saved = self
            .document
            .apply_and_save(DocumentCommand::Replace(Box::new(document)))
            .await?;
        Ok(saved_result("The OpenAPI document", saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_tools::test_support;

    #[tokio::test]
    async fn replaces_whole_document() {
        let (document, gateway) = test_support::document().await;
        let tool = OverwriteSpecificationTool::new(document.clone());

        let result = tool
            .execute(json!({ "openapi_spec": {
                "openapi": "3.1.0",
                "info": { "title": "Inventory", "version": "0.1.0", "description": "Stock levels" },
                "paths": {},
                "components": { "schemas": { "Item": { "type": "object" } } }
            } }))
            .await
            .unwrap();

        assert_eq!(result.content, "The OpenAPI document has been updated.");
        let doc = document.document().await.unwrap();
        assert_eq!(doc.info.title, "Inventory");
        assert!(doc.components.schemas.contains_key("Item"));
        assert_eq!(gateway.write_count(), 1);
    }

    #[tokio::test]
    async fn wrong_version_is_rejected() {
        let (document, _) = test_support::document().await;
        let err = OverwriteSpecificationTool::new(document.clone())
            .execute(json!({ "openapi_spec": { "openapi": "3.0.0", "info": { "title": "x", "version": "1" } } }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("openapi_spec.openapi"));
        assert_eq!(document.document().await.unwrap().info.title, "My API");
    }
}
