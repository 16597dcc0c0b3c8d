// ABOUTME: Validate-Spec tool: reports every diagnostic for the working document as YAML.
// ABOUTME: Never mutates or saves.

use apiwright_core::DocumentHandle;
use apiwright_core::validation::render_diagnostics;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tool::{Tool, ToolError, ToolId, ToolResult};

#[derive(Clone)]
pub struct ValidateSpecTool {
    document: DocumentHandle,
}

impl ValidateSpecTool {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl Tool for ValidateSpecTool {
    fn id(&self) -> ToolId {
        ToolId::ValidateSpec
    }

    fn description(&self) -> &str {
        "Lint the current OpenAPI document and list every finding with its code, message, and path."
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
        let diagnostics = self.document.validate().await?;
        Ok(ToolResult::text(render_diagnostics(&diagnostics)))
    }
}
