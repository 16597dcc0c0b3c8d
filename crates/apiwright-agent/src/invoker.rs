// ABOUTME: Tool invoker: resolves a model tool call by name, runs it, and always yields a string output.
// ABOUTME: Argument, lookup, and execution errors become error text so the model can correct itself.

use apiwright_core::DocumentHandle;
use futures::future::join_all;
use serde_json::{Value, json};

use crate::spec_tools::build_registry;
use crate::tool::{ToolError, ToolRegistry, ToolResult};
use crate::transport::{ToolCall, ToolDefinition, ToolOutput};

pub struct ToolInvoker {
    registry: ToolRegistry,
}

/// Render a tool error as the YAML snippet the model sees.
fn error_text(e: &ToolError) -> String {
    serde_yaml::to_string(&json!({ "error": e.to_string() })).unwrap_or_else(|_| format!("error: {e}"))
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// An invoker over the full catalogue for one document.
    pub fn for_document(document: &DocumentHandle) -> Self {
        Self::new(build_registry(document))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    async fn run(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self.registry.get(&call.name)?;
        let params: Value = if call.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}"))
            })?
        };
        tool.execute(params).await
    }

    /// Execute one call. Never fails.
    pub async fn invoke(&self, call: &ToolCall) -> ToolOutput {
        let output = match self.run(call).await {
            Ok(result) => {
                tracing::info!(
                    tool = %call.name,
                    tool_call_id = %call.id,
                    is_error = result.is_error,
                    "tool call finished"
                );
                result.content
            }
            Err(e) => {
                tracing::warn!(
                    tool = %call.name,
                    tool_call_id = %call.id,
                    error = %e,
                    "tool call failed"
                );
                error_text(&e)
            }
        };
        ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        }
    }

    /// Execute every call concurrently. Outputs keep the order of `calls`.
    pub async fn invoke_all(&self, calls: &[&ToolCall]) -> Vec<ToolOutput> {
        join_all(calls.iter().map(|call| self.invoke(call))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_tools::test_support;

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn errors_become_output_text() {
        let (document, _) = test_support::document().await;
        let invoker = ToolInvoker::for_document(&document);

        let unknown = invoker.invoke(&call("c1", "Drop-Database", "{}")).await;
        assert_eq!(unknown.tool_call_id, "c1");
        assert!(unknown.output.starts_with("error:"));
        assert!(unknown.output.contains("tool not found: Drop-Database"));

        let bad_json = invoker.invoke(&call("c2", "Set-Info", "{not json")).await;
        assert!(bad_json.output.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn empty_arguments_mean_empty_object() {
        let (document, _) = test_support::document().await;
        let invoker = ToolInvoker::for_document(&document);
        let out = invoker.invoke(&call("c1", "Validate-Spec", "")).await;
        assert!(out.output.contains("info-description"));
    }

    #[tokio::test]
    async fn batch_preserves_order_and_count() {
        let (document, _) = test_support::document().await;
        let invoker = ToolInvoker::for_document(&document);

        let calls = [
            call("a", "Set-Global-Tags", r#"{"tags":[{"name":"users"}]}"#),
            call("b", "Nope", "{}"),
            call("c", "Set-Schema-Component", r#"{"name":"User","schema":{"type":"object"}}"#),
        ];
        let refs: Vec<&ToolCall> = calls.iter().collect();
        let outputs = invoker.invoke_all(&refs).await;

        let ids: Vec<&str> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(outputs[1].output.contains("tool not found"));
        let doc = document.document().await.unwrap();
        assert_eq!(doc.tags.len(), 1);
        assert!(doc.components.schemas.contains_key("User"));
    }
}
