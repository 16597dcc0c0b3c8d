// ABOUTME: Set-*-Component tools: one parameterized tool per component collection.
// ABOUTME: Upserts a named component, or removes it when the value is absent, null, or empty.

use apiwright_core::{ComponentKind, DocumentCommand, DocumentHandle};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{saved_result, shape};
use crate::tool::{Tool, ToolError, ToolId, ToolResult};

/// The argument key carrying the component body for `kind`.
pub fn value_key(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::Schemas => "schema",
        ComponentKind::Responses => "response",
        ComponentKind::Parameters => "parameter",
        ComponentKind::Examples => "example",
        ComponentKind::RequestBodies => "requestBody",
        ComponentKind::Headers => "header",
        ComponentKind::SecuritySchemes => "securityScheme",
        ComponentKind::Links => "link",
        ComponentKind::Callbacks => "callback",
    }
}

fn value_schema(kind: ComponentKind) -> Value {
    match kind {
        ComponentKind::Schemas => json!({
            "type": "object",
            "description": "A JSON Schema with a `type` (string, number, integer, boolean, array, object) or a `$ref`.",
            "properties": {
                "type": {},
                "$ref": { "type": "string" }
            }
        }),
        ComponentKind::Responses => json!({
            "type": "object",
            "description": "A response object with a non-empty `description`, or a `$ref`.",
            "properties": { "description": { "type": "string" } }
        }),
        ComponentKind::Parameters => json!({
            "type": "object",
            "description": "A parameter object with `name` and `in` (query, header, path, cookie), or a `$ref`.",
            "properties": {
                "name": { "type": "string" },
                "in": { "type": "string", "enum": ["query", "header", "path", "cookie"] }
            }
        }),
        _ => json!({
            "type": "object",
            "description": format!("The {} object.", kind.label().to_ascii_lowercase())
        }),
    }
}

pub struct SetComponentTool {
    kind: ComponentKind,
    description: String,
    document: DocumentHandle,
}

impl SetComponentTool {
    pub fn new(kind: ComponentKind, document: DocumentHandle) -> Self {
        let description = format!(
            "Create, replace, or delete the {} component `name` under components.{}. Omit `{}` (or pass {{}}) to delete it.",
            kind.label().to_ascii_lowercase(),
            kind.as_str(),
            value_key(kind),
        );
        Self {
            kind,
            description,
            document,
        }
    }
}

#[async_trait]
impl Tool for SetComponentTool {
    fn id(&self) -> ToolId {
        ToolId::SetComponent(self.kind)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        let key = value_key(self.kind);
        let mut properties = serde_json::Map::new();
        properties.insert(
            "name".to_string(),
            json!({ "type": "string", "description": "Component name, e.g. User." }),
        );
        properties.insert(key.to_string(), value_schema(self.kind));
        json!({
            "type": "object",
            "properties": properties,
            "required": ["name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let name = shape::non_empty_str(&params, "name", "")?.to_string();
        let key = value_key(self.kind);
        let subject = format!("{} {name}", self.kind.label());

        let command = match shape::present(params.get(key)) {
            None => DocumentCommand::RemoveComponent {
                kind: self.kind,
                name,
            },
            Some(value) => {
                shape::component(self.kind, value, key)?;
                DocumentCommand::UpsertComponent {
                    kind: self.kind,
                    name,
                    value: value.clone(),
                }
            }
        };

        let saved = self.document.apply_and_save(command).await?;
        Ok(saved_result(&subject, saved))
    }
}
