// ABOUTME: Input-shape checks for tool arguments, applied before anything touches the document.
// ABOUTME: Each check reports the dotted path of the first offending field.

use apiwright_core::rules::is_status_key;
use apiwright_core::{Document, HttpMethod, Info, Operation, Server, Tag};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::tool::ToolError;

const PARAMETER_LOCATIONS: [&str; 4] = ["query", "header", "path", "cookie"];
const SCHEMA_TYPES: [&str; 6] = ["string", "number", "integer", "boolean", "array", "object"];

fn invalid(at: &str, message: &str) -> ToolError {
    ToolError::InvalidArguments(format!("{at}: {message}"))
}

fn join(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{at}.{key}")
    }
}

/// A value counts as absent when it is missing, null, or an empty object.
pub fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(v) => Some(v),
    }
}

pub fn object<'a>(value: &'a Value, at: &str) -> Result<&'a Map<String, Value>, ToolError> {
    value
        .as_object()
        .ok_or_else(|| invalid(at, "expected an object"))
}

pub fn non_empty_str<'a>(parent: &'a Value, key: &str, at: &str) -> Result<&'a str, ToolError> {
    match parent.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        _ => Err(invalid(&join(at, key), "required non-empty string")),
    }
}

fn string(parent: &Value, key: &str, at: &str) -> Result<(), ToolError> {
    match parent.get(key) {
        Some(Value::String(_)) => Ok(()),
        _ => Err(invalid(&join(at, key), "required string")),
    }
}

fn is_ref(value: &Value) -> bool {
    value.get("$ref").is_some_and(Value::is_string)
}

fn decode<T: DeserializeOwned>(value: &Value, at: &str) -> Result<T, ToolError> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(at, &e.to_string()))
}

pub fn path(params: &Value) -> Result<String, ToolError> {
    let path = non_empty_str(params, "path", "")?;
    if !path.starts_with('/') {
        return Err(invalid("path", "must start with \"/\""));
    }
    Ok(path.to_string())
}

pub fn method(params: &Value) -> Result<HttpMethod, ToolError> {
    non_empty_str(params, "method", "")?
        .parse::<HttpMethod>()
        .map_err(|e: apiwright_core::document::UnknownMethod| invalid("method", &e.to_string()))
}

pub fn parameter(value: &Value, at: &str) -> Result<(), ToolError> {
    object(value, at)?;
    if is_ref(value) {
        return Ok(());
    }
    non_empty_str(value, "name", at)?;
    let location = non_empty_str(value, "in", at)?;
    if !PARAMETER_LOCATIONS.contains(&location) {
        return Err(invalid(
            &join(at, "in"),
            "must be one of query, header, path, cookie",
        ));
    }
    Ok(())
}

pub fn response(value: &Value, at: &str) -> Result<(), ToolError> {
    object(value, at)?;
    if is_ref(value) {
        return Ok(());
    }
    non_empty_str(value, "description", at).map(|_| ())
}

pub fn schema(value: &Value, at: &str) -> Result<(), ToolError> {
    object(value, at)?;
    if is_ref(value) {
        return Ok(());
    }
    let allowed = |t: &Value| {
        t.as_str()
            .is_some_and(|t| SCHEMA_TYPES.contains(&t) || t == "null")
    };
    let ok = match value.get("type") {
        Some(Value::String(t)) => SCHEMA_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => {
            !types.is_empty()
                && types.iter().all(allowed)
                && types.iter().any(|t| t.as_str() != Some("null"))
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(
            &join(at, "type"),
            "must be one of string, number, integer, boolean, array, object",
        ))
    }
}

pub fn operation(value: &Value) -> Result<Operation, ToolError> {
    let at = "operation";
    object(value, at)?;
    non_empty_str(value, "operationId", at)?;
    string(value, "summary", at)?;
    string(value, "description", at)?;

    match value.get("tags") {
        Some(Value::Array(tags))
            if !tags.is_empty()
                && tags
                    .iter()
                    .all(|t| t.as_str().is_some_and(|s| !s.trim().is_empty())) => {}
        _ => {
            return Err(invalid(
                "operation.tags",
                "required array with at least one non-empty string",
            ));
        }
    }

    if let Some(parameters) = value.get("parameters") {
        let items = parameters
            .as_array()
            .ok_or_else(|| invalid("operation.parameters", "expected an array"))?;
        for (i, p) in items.iter().enumerate() {
            parameter(p, &format!("operation.parameters.{i}"))?;
        }
    }

    let responses = value
        .get("responses")
        .ok_or_else(|| invalid("operation.responses", "required object"))?;
    for (code, body) in object(responses, "operation.responses")? {
        let at = format!("operation.responses.{code}");
        if !is_status_key(code) {
            return Err(invalid(&at, "key must be a status code pattern or \"default\""));
        }
        response(body, &at)?;
    }

    decode(value, at)
}

/// Check a component body according to its kind. Unchecked kinds must still be objects.
pub fn component(kind: apiwright_core::ComponentKind, value: &Value, at: &str) -> Result<(), ToolError> {
    use apiwright_core::ComponentKind::*;
    match kind {
        Schemas => schema(value, at),
        Responses => response(value, at),
        Parameters => parameter(value, at),
        _ => object(value, at).map(|_| ()),
    }
}

pub fn info(value: &Value) -> Result<Info, ToolError> {
    object(value, "info")?;
    non_empty_str(value, "title", "info")?;
    non_empty_str(value, "version", "info")?;
    decode(value, "info")
}

pub fn servers(value: Option<&Value>) -> Result<Vec<Server>, ToolError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| invalid("servers", "expected an array"))?;
    for (i, server) in items.iter().enumerate() {
        let at = format!("servers.{i}");
        object(server, &at)?;
        non_empty_str(server, "url", &at)?;
    }
    decode(value, "servers")
}

pub fn tags(value: Option<&Value>) -> Result<Vec<Tag>, ToolError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| invalid("tags", "expected an array"))?;
    for (i, tag) in items.iter().enumerate() {
        let at = format!("tags.{i}");
        object(tag, &at)?;
        non_empty_str(tag, "name", &at)?;
    }
    decode(value, "tags")
}

/// A whole replacement document: must declare 3.1.0 and carry a valid info object.
pub fn document(value: &Value) -> Result<Document, ToolError> {
    let at = "openapi_spec";
    object(value, at)?;
    match value.get("openapi") {
        Some(Value::String(v)) if v == apiwright_core::document::OPENAPI_VERSION => {}
        _ => return Err(invalid(&join(at, "openapi"), "must be \"3.1.0\"")),
    }
    let info_value = value
        .get("info")
        .ok_or_else(|| invalid(&join(at, "info"), "required object"))?;
    info(info_value).map_err(|e| match e {
        ToolError::InvalidArguments(msg) => ToolError::InvalidArguments(format!("{at}.{msg}")),
        other => other,
    })?;
    decode(value, at)
}
