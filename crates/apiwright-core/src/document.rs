// ABOUTME: OpenAPI 3.1 document model: info, servers, tags, path items, operations, and components.
// ABOUTME: Serializes to the standard JSON wire shape and keeps unknown x- extension members verbatim.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// The only OpenAPI version this tool authors.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Title given to a freshly seeded document.
pub const DEFAULT_TITLE: &str = "My API";

/// Version given to a freshly seeded document.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// The root of an OpenAPI specification.
///
/// Deserialization is lenient: a document missing required
/// members still loads, and the validation rules report what is wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub openapi: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "Components::is_empty")]
    pub components: Components,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Default for Document {
    /// The minimal skeleton a persistence backend seeds when nothing is stored yet.
    fn default() -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: DEFAULT_TITLE.to_string(),
                version: DEFAULT_VERSION.to_string(),
                ..Info::default()
            },
            servers: Vec::new(),
            tags: Vec::new(),
            paths: BTreeMap::new(),
            components: Components::default(),
            extensions: Map::new(),
        }
    }
}

impl Document {
    /// Look up the operation registered for `path` and `method`, if any.
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(path).and_then(|item| item.operations.get(&method))
    }

    /// Iterate every operation in path order, then method order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, HttpMethod, &Operation)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.operations
                .iter()
                .map(move |(method, op)| (path.as_str(), *method, op))
        })
    }

    /// Serialize to indented JSON, the format used for storage and run instructions.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// The `info` section. Title and version are required by the validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(
        rename = "termsOfService",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub terms_of_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A base URL the API is served from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, ServerVariable>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerVariable {
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A global tag used to group operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// HTTP methods a path item can carry an operation for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// The lowercase key used in a path item.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the eight HTTP methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive, so "GET" and "get" resolve to the same method.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == lowered)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A path item: shared metadata plus one operation per HTTP method.
///
/// Serialized as a flat JSON object where the method names sit beside
/// `summary`, `description`, and any extension members.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct PathItem {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<Vec<Value>>,
    pub servers: Option<Vec<Server>>,
    pub operations: BTreeMap<HttpMethod, Operation>,
    pub extensions: Map<String, Value>,
}

impl PathItem {
    /// True when the path item carries no operation.
    pub fn has_no_operations(&self) -> bool {
        self.operations.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for PathItem {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut item = PathItem::default();
        for (key, value) in map {
            if let Ok(method) = key.parse::<HttpMethod>()
                && key == method.as_str()
            {
                item.operations
                    .insert(method, serde_json::from_value(value)?);
                continue;
            }
            match key.as_str() {
                "summary" => item.summary = serde_json::from_value(value)?,
                "description" => item.description = serde_json::from_value(value)?,
                "parameters" => item.parameters = serde_json::from_value(value)?,
                "servers" => item.servers = serde_json::from_value(value)?,
                _ => {
                    item.extensions.insert(key, value);
                }
            }
        }
        Ok(item)
    }
}

impl Serialize for PathItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(summary) = &self.summary {
            map.serialize_entry("summary", summary)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(parameters) = &self.parameters {
            map.serialize_entry("parameters", parameters)?;
        }
        if let Some(servers) = &self.servers {
            map.serialize_entry("servers", servers)?;
        }
        for (method, operation) in &self.operations {
            map.serialize_entry(method.as_str(), operation)?;
        }
        for (key, value) in &self.extensions {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A single API operation on a path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId", default)]
    pub operation_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    /// Keyed by status-code pattern (`200`, `4XX`) or the literal `default`.
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    /// Free-form implementation notes for humans and the model. Never interpreted.
    #[serde(
        rename = "x-implementation-details",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub implementation_details: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// The named component collections a document can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Schemas,
    Responses,
    Parameters,
    Examples,
    RequestBodies,
    Headers,
    SecuritySchemes,
    Links,
    Callbacks,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Schemas,
        ComponentKind::Responses,
        ComponentKind::Parameters,
        ComponentKind::Examples,
        ComponentKind::RequestBodies,
        ComponentKind::Headers,
        ComponentKind::SecuritySchemes,
        ComponentKind::Links,
        ComponentKind::Callbacks,
    ];

    /// The key of this collection under `components`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Schemas => "schemas",
            ComponentKind::Responses => "responses",
            ComponentKind::Parameters => "parameters",
            ComponentKind::Examples => "examples",
            ComponentKind::RequestBodies => "requestBodies",
            ComponentKind::Headers => "headers",
            ComponentKind::SecuritySchemes => "securitySchemes",
            ComponentKind::Links => "links",
            ComponentKind::Callbacks => "callbacks",
        }
    }

    /// Singular human label, e.g. "Request body".
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Schemas => "Schema",
            ComponentKind::Responses => "Response",
            ComponentKind::Parameters => "Parameter",
            ComponentKind::Examples => "Example",
            ComponentKind::RequestBodies => "Request body",
            ComponentKind::Headers => "Header",
            ComponentKind::SecuritySchemes => "Security scheme",
            ComponentKind::Links => "Link",
            ComponentKind::Callbacks => "Callback",
        }
    }

    /// Resolve a `components` key back to its kind.
    pub fn from_key(key: &str) -> Option<Self> {
        ComponentKind::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reusable component collections. Bodies are opaque JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, Value>,
    #[serde(rename = "requestBodies", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_bodies: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    #[serde(rename = "securitySchemes", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callbacks: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Components {
    pub fn collection(&self, kind: ComponentKind) -> &BTreeMap<String, Value> {
        match kind {
            ComponentKind::Schemas => &self.schemas,
            ComponentKind::Responses => &self.responses,
            ComponentKind::Parameters => &self.parameters,
            ComponentKind::Examples => &self.examples,
            ComponentKind::RequestBodies => &self.request_bodies,
            ComponentKind::Headers => &self.headers,
            ComponentKind::SecuritySchemes => &self.security_schemes,
            ComponentKind::Links => &self.links,
            ComponentKind::Callbacks => &self.callbacks,
        }
    }

    pub fn collection_mut(&mut self, kind: ComponentKind) -> &mut BTreeMap<String, Value> {
        match kind {
            ComponentKind::Schemas => &mut self.schemas,
            ComponentKind::Responses => &mut self.responses,
            ComponentKind::Parameters => &mut self.parameters,
            ComponentKind::Examples => &mut self.examples,
            ComponentKind::RequestBodies => &mut self.request_bodies,
            ComponentKind::Headers => &mut self.headers,
            ComponentKind::SecuritySchemes => &mut self.security_schemes,
            ComponentKind::Links => &mut self.links,
            ComponentKind::Callbacks => &mut self.callbacks,
        }
    }

    /// True when every collection is empty and no extension is present.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && ComponentKind::ALL
                .into_iter()
                .all(|kind| self.collection(kind).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_document_matches_seed_skeleton() {
        let doc = Document::default();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "openapi": "3.1.0",
                "info": { "title": "My API", "version": "1.0.0" },
                "servers": [],
                "tags": [],
                "paths": {}
            })
        );
    }

    #[test]
    fn path_item_keeps_methods_beside_metadata() {
        let raw = json!({
            "summary": "Users",
            "get": {
                "operationId": "listUsers",
                "tags": ["users"],
                "summary": "List users",
                "description": "Returns every user",
                "responses": { "200": { "description": "ok" } },
                "x-implementation-details": "Paginate with a cursor"
            },
            "x-owner": "platform"
        });

        let item: PathItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.summary.as_deref(), Some("Users"));
        let get = item.operations.get(&HttpMethod::Get).expect("get operation");
        assert_eq!(get.operation_id, "listUsers");
        assert_eq!(
            get.implementation_details.as_deref(),
            Some("Paginate with a cursor")
        );
        assert_eq!(item.extensions.get("x-owner"), Some(&json!("platform")));

        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn uppercase_method_keys_are_treated_as_extensions() {
        let item: PathItem = serde_json::from_value(json!({ "GET": {} })).unwrap();
        assert!(item.operations.is_empty());
        assert!(item.extensions.contains_key("GET"));
    }

    #[test]
    fn http_method_parses_case_insensitively() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("fetch".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn lenient_load_accepts_missing_members() {
        let doc: Document = serde_json::from_value(json!({ "paths": {} })).unwrap();
        assert!(doc.openapi.is_empty());
        assert!(doc.info.title.is_empty());
    }

    #[test]
    fn components_round_trip_with_camel_case_keys() {
        let raw = json!({
            "openapi": "3.1.0",
            "info": { "title": "T", "version": "1" },
            "servers": [],
            "tags": [],
            "paths": {},
            "components": {
                "requestBodies": { "NewUser": { "content": {} } },
                "securitySchemes": { "bearer": { "type": "http", "scheme": "bearer" } }
            }
        });
        let doc: Document = serde_json::from_value(raw.clone()).unwrap();
        assert!(
            doc.components
                .collection(ComponentKind::RequestBodies)
                .contains_key("NewUser")
        );
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn component_kind_keys_resolve() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_key(kind.as_str()), Some(kind));
        }
        assert_eq!(ComponentKind::from_key("widgets"), None);
    }
}
