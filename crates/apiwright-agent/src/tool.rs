// ABOUTME: Tool trait, closed tool identifier set, and the registry that maps names to handlers.
// ABOUTME: Tool errors are values; the invoker turns them into text for the model.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use apiwright_core::ComponentKind;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::transport::ToolDefinition;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("document is not loaded")]
    NotLoaded,

    #[error("document actor is unavailable")]
    Unavailable,

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<apiwright_core::ActorError> for ToolError {
    fn from(e: apiwright_core::ActorError) -> Self {
        match e {
            apiwright_core::ActorError::Store(_) => ToolError::NotLoaded,
            apiwright_core::ActorError::Validation(v) => ToolError::Validation(v.to_string()),
            apiwright_core::ActorError::ChannelClosed => ToolError::Unavailable,
        }
    }
}

/// Text handed back to the model for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Every tool the model can call. Names are a public contract with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    SetEndpointOperation,
    SetComponent(ComponentKind),
    SetInfo,
    SetServers,
    SetGlobalTags,
    OverwriteSpecification,
    ValidateSpec,
    SaveSpecification,
}

impl ToolId {
    pub fn all() -> Vec<ToolId> {
        let mut ids = vec![ToolId::SetEndpointOperation];
        ids.extend(ComponentKind::ALL.into_iter().map(ToolId::SetComponent));
        ids.extend([
            ToolId::SetInfo,
            ToolId::SetServers,
            ToolId::SetGlobalTags,
            ToolId::OverwriteSpecification,
            ToolId::ValidateSpec,
            ToolId::SaveSpecification,
        ]);
        ids
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::SetEndpointOperation => "Set-Endpoint-Operation",
            ToolId::SetComponent(kind) => match kind {
                ComponentKind::Schemas => "Set-Schema-Component",
                ComponentKind::Responses => "Set-Response-Component",
                ComponentKind::Parameters => "Set-Parameter-Component",
                ComponentKind::Examples => "Set-Example-Component",
                ComponentKind::RequestBodies => "Set-RequestBody-Component",
                ComponentKind::Headers => "Set-Header-Component",
                ComponentKind::SecuritySchemes => "Set-SecurityScheme-Component",
                ComponentKind::Links => "Set-Link-Component",
                ComponentKind::Callbacks => "Set-Callback-Component",
            },
            ToolId::SetInfo => "Set-Info",
            ToolId::SetServers => "Set-Server",
            ToolId::SetGlobalTags => "Set-Global-Tags",
            ToolId::OverwriteSpecification => "Overwrite-Specification",
            ToolId::ValidateSpec => "Validate-Spec",
            ToolId::SaveSpecification => "Save-OpenAPI-Specification",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<ToolId> {
        ToolId::all().into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;

    fn description(&self) -> &str;

    /// JSON schema of the argument object.
    fn schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError>;

    fn name(&self) -> &'static str {
        self.id().name()
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema(),
        }
    }
}

/// Closed mapping from tool id to handler.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        ToolId::from_name(name)
            .and_then(|id| self.tools.get(&id))
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().map(|id| id.name()).collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }
}
