// ABOUTME: Built-in structural rules for OpenAPI documents, used when no external linter is configured.
// ABOUTME: Reports blocking errors for broken structure and advisory findings for style gaps.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{Document, OPENAPI_VERSION};
use crate::validation::{
    Diagnostic, DiagnosticProducer, SEVERITY_ERROR, SEVERITY_INFO, SEVERITY_WARNING,
    ValidationError,
};

/// True when `key` is a valid response key: `default`, `200`, or `4XX`.
pub fn is_status_key(key: &str) -> bool {
    if key == "default" {
        return true;
    }
    let bytes = key.as_bytes();
    if bytes.len() != 3 || !(b'1'..=b'5').contains(&bytes[0]) {
        return false;
    }
    let digits = bytes[1].is_ascii_digit() && bytes[2].is_ascii_digit();
    let wildcard = bytes[1] == b'X' && bytes[2] == b'X';
    digits || wildcard
}

/// Structural checks that need nothing but the document itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralRules;

impl StructuralRules {
    pub fn check(&self, document: &Document) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        check_header(document, &mut out);
        check_operations(document, &mut out);
        check_servers(document, &mut out);
        check_refs(document, &mut out);
        out
    }
}

#[async_trait]
impl DiagnosticProducer for StructuralRules {
    fn name(&self) -> &str {
        "structural-rules"
    }

    async fn diagnose(&self, document: &Document) -> Result<Vec<Diagnostic>, ValidationError> {
        Ok(self.check(document))
    }
}

fn path_of(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn check_header(document: &Document, out: &mut Vec<Diagnostic>) {
    if document.openapi != OPENAPI_VERSION {
        out.push(Diagnostic::new(
            "openapi-version",
            format!(
                "openapi must be \"{OPENAPI_VERSION}\", found \"{}\"",
                document.openapi
            ),
            path_of(&["openapi"]),
            SEVERITY_ERROR,
        ));
    }
    if document.info.title.trim().is_empty() {
        out.push(Diagnostic::new(
            "info-title",
            "info.title must be a non-empty string",
            path_of(&["info", "title"]),
            SEVERITY_ERROR,
        ));
    }
    if document.info.version.trim().is_empty() {
        out.push(Diagnostic::new(
            "info-version",
            "info.version must be a non-empty string",
            path_of(&["info", "version"]),
            SEVERITY_ERROR,
        ));
    }
    if document.info.description.as_deref().is_none_or(|d| d.trim().is_empty()) {
        out.push(Diagnostic::new(
            "info-description",
            "info.description should describe the API",
            path_of(&["info"]),
            SEVERITY_WARNING,
        ));
    }
    for (i, tag) in document.tags.iter().enumerate() {
        if tag.name.trim().is_empty() {
            out.push(Diagnostic::new(
                "tag-name",
                "tags must have a non-empty name",
                vec!["tags".to_string(), i.to_string(), "name".to_string()],
                SEVERITY_ERROR,
            ));
        }
    }
}

fn check_operations(document: &Document, out: &mut Vec<Diagnostic>) {
    let declared_tags: BTreeSet<&str> = document.tags.iter().map(|t| t.name.as_str()).collect();
    let mut seen_ids: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for path in document.paths.keys() {
        if !path.starts_with('/') {
            out.push(Diagnostic::new(
                "path-leading-slash",
                format!("path \"{path}\" must start with \"/\""),
                path_of(&["paths", path]),
                SEVERITY_ERROR,
            ));
        }
    }

    for (path, method, op) in document.operations() {
        let at = |field: &str| -> Vec<String> {
            let mut p = path_of(&["paths", path, method.as_str()]);
            if !field.is_empty() {
                p.push(field.to_string());
            }
            p
        };

        if op.operation_id.trim().is_empty() {
            out.push(Diagnostic::new(
                "operation-id",
                format!("{method} {path} has no operationId"),
                at("operationId"),
                SEVERITY_ERROR,
            ));
        } else {
            seen_ids
                .entry(op.operation_id.as_str())
                .or_default()
                .push(format!("{method} {path}"));
        }

        if op.tags.is_empty() || op.tags.iter().any(|t| t.trim().is_empty()) {
            out.push(Diagnostic::new(
                "operation-tags",
                format!("{method} {path} needs at least one non-empty tag"),
                at("tags"),
                SEVERITY_ERROR,
            ));
        }
        for tag in op.tags.iter().filter(|t| !t.trim().is_empty()) {
            if !declared_tags.contains(tag.as_str()) {
                out.push(Diagnostic::new(
                    "operation-tag-defined",
                    format!("tag \"{tag}\" is not declared in the global tags list"),
                    at("tags"),
                    SEVERITY_WARNING,
                ));
            }
        }

        if op.summary.trim().is_empty() {
            out.push(Diagnostic::new(
                "operation-summary",
                format!("{method} {path} should have a summary"),
                at("summary"),
                SEVERITY_WARNING,
            ));
        }
        if op.description.trim().is_empty() {
            out.push(Diagnostic::new(
                "operation-description",
                format!("{method} {path} should have a description"),
                at("description"),
                SEVERITY_WARNING,
            ));
        }

        if op.responses.is_empty() {
            out.push(Diagnostic::new(
                "operation-responses",
                format!("{method} {path} must declare at least one response"),
                at("responses"),
                SEVERITY_ERROR,
            ));
        }
        for key in op.responses.keys() {
            if !is_status_key(key) {
                let mut p = at("responses");
                p.push(key.clone());
                out.push(Diagnostic::new(
                    "response-status-code",
                    format!("\"{key}\" is not a status code pattern or \"default\""),
                    p,
                    SEVERITY_ERROR,
                ));
            }
        }

        if op.implementation_details.as_deref().is_none_or(|d| d.trim().is_empty()) {
            out.push(Diagnostic::new(
                "implementation-details",
                format!("{method} {path} has no x-implementation-details"),
                at(""),
                SEVERITY_INFO,
            ));
        }
    }

    for (id, locations) in seen_ids {
        if locations.len() > 1 {
            out.push(Diagnostic::new(
                "operation-id-unique",
                format!("operationId \"{id}\" is used by {}", locations.join(", ")),
                path_of(&["paths"]),
                SEVERITY_ERROR,
            ));
        }
    }
}

fn check_servers(document: &Document, out: &mut Vec<Diagnostic>) {
    for (i, server) in document.servers.iter().enumerate() {
        if server.url.trim().is_empty() {
            out.push(Diagnostic::new(
                "server-url",
                "servers must have a non-empty url",
                vec!["servers".to_string(), i.to_string(), "url".to_string()],
                SEVERITY_ERROR,
            ));
        }
    }
}

/// Every local `$ref` must point at a node that exists in the document.
fn check_refs(document: &Document, out: &mut Vec<Diagnostic>) {
    let Ok(root) = serde_json::to_value(document) else {
        return;
    };
    let mut refs = Vec::new();
    collect_refs(&root, &mut Vec::new(), &mut refs);
    for (path, target) in refs {
        let Some(pointer) = target.strip_prefix('#') else {
            continue;
        };
        if root.pointer(pointer).is_none() {
            out.push(Diagnostic::new(
                "unresolved-ref",
                format!("$ref \"{target}\" does not resolve"),
                path,
                SEVERITY_ERROR,
            ));
        }
    }
}

fn collect_refs(node: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("$ref") {
                out.push((path.clone(), target.clone()));
            }
            for (key, child) in map {
                path.push(key.clone());
                collect_refs(child, path, out);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                collect_refs(child, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}
