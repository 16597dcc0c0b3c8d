// ABOUTME: The OpenAPI authoring tools the model calls, one module per tool family.
// ABOUTME: build_registry wires every tool to a conversation's document actor.

pub mod overwrite;
pub mod save;
pub mod set_component;
pub mod set_endpoint;
pub mod set_info;
pub mod set_servers;
pub mod set_tags;
pub mod shape;
pub mod validate;

use apiwright_core::{Change, ComponentKind, DocumentHandle, SavedChange};

use crate::tool::{ToolRegistry, ToolResult};

pub use overwrite::OverwriteSpecificationTool;
pub use save::SaveSpecificationTool;
pub use set_component::SetComponentTool;
pub use set_endpoint::SetEndpointOperationTool;
pub use set_info::SetInfoTool;
pub use set_servers::SetServersTool;
pub use set_tags::SetGlobalTagsTool;
pub use validate::ValidateSpecTool;

/// Register the full tool catalogue against one document.
pub fn build_registry(document: &DocumentHandle) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(SetEndpointOperationTool::new(document.clone()));
    for kind in ComponentKind::ALL {
        registry.register(SetComponentTool::new(kind, document.clone()));
    }
    registry.register(SetInfoTool::new(document.clone()));
    registry.register(SetServersTool::new(document.clone()));
    registry.register(SetGlobalTagsTool::new(document.clone()));
    registry.register(OverwriteSpecificationTool::new(document.clone()));
    registry.register(ValidateSpecTool::new(document.clone()));
    registry.register(SaveSpecificationTool::new(document.clone()));
    registry
}

/// Status text for a mutation and its save attempt.
pub(crate) fn saved_result(subject: &str, saved: SavedChange) -> ToolResult {
    let status = match saved.change {
        Change::Upserted => format!("{subject} has been updated."),
        Change::Removed => format!("{subject} has been removed."),
        Change::Unchanged => format!("{subject} does not exist; nothing was removed."),
    };
    match saved.save {
        Ok(report) if report.advisories.is_empty() => ToolResult::text(status),
        Ok(report) => ToolResult::text(format!(
            "{status} {} advisory finding(s) remain; call Validate-Spec for details.",
            report.advisories.len()
        )),
        Err(e) => ToolResult::error(format!(
            "{status} The change is kept in the working document but was NOT saved: {e}"
        )),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use apiwright_core::{DocumentHandle, StructuralRules, ValidationGate, actor};

    use crate::testing::RecordingGateway;

    /// A document actor over the default document and an in-memory gateway.
    pub async fn document() -> (DocumentHandle, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::new());
        let handle = actor::open(
            "test-conversation",
            gateway.clone(),
            ValidationGate::new(Arc::new(StructuralRules)),
        )
        .await
        .unwrap();
        (handle, gateway)
    }
}
