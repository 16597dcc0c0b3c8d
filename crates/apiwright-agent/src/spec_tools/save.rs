// ABOUTME: Save-OpenAPI-Specification tool: forces a validated save of the working document.
// ABOUTME: A blocked save is reported back to the model as an error result, not a tool failure.

use apiwright_core::DocumentHandle;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct SaveSpecificationTool {
    document: DocumentHandle,
}

impl SaveSpecificationTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for SaveSpecificationTool {
    fn id(&self) -> ToolId {
        ToolId::SaveSpecification
    }

    fn description(&self) -> &str {
        "Validate and save the OpenAPI document. Fails with the blocking findings if it is invalid."
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
        Ok(match self.document.save().await {
            Ok(_) => ToolResult::text("The OpenAPI document has been saved."),
            Err(e) => ToolResult::error(format!("Failed to save the OpenAPI document: {e}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_tools::test_support;
    use apiwright_core::{ComponentKind, DocumentCommand};

    #[tokio::test]
    async fn saves_valid_document() {
        let (document, gateway) = test_support::document().await;
        let result = SaveSpecificationTool::new(document)
            .execute(json!({}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(gateway.write_count(), 1);
    }

    #[tokio::test]
    async fn refuses_invalid_document() {
        let (document, gateway) = test_support::document().await;
        document
            .apply(DocumentCommand::UpsertComponent {
                kind: ComponentKind::Schemas,
                name: "Broken".to_string(),
                value: json!({ "$ref": "#/components/schemas/Nowhere" }),
            })
            .await
            .unwrap();

        let result = SaveSpecificationTool::new(document)
            .execute(json!({}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("unresolved-ref"));
        assert_eq!(gateway.write_count(), 0);
    }
}
