//! Response envelope normalization.
//!
//! The backend wraps payloads inconsistently. Each endpoint passes its raw body
//! through exactly one of these functions, which either yields the typed payload
//! or an [`ApiError::Shape`].
//!
//! Accepted list shapes: `[...]`, `{data: [...]}`, `{items: [...]}`,
//! `{data: {items: [...]}}` and `{data: null}` (empty).
//! Accepted object shapes: `{data: {...}}` or a bare object.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::interfaces::tracking_api::{ApiError, Result};

/// Which envelope a body arrived in. Logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Bare,
    Data,
    Items,
    DataItems,
    Empty,
}

/// Unwrap a list body and decode each element.
///
/// Elements that fail to decode are skipped and logged; a body that is not a
/// list in any accepted envelope is a shape error.
pub fn normalize_list<T: DeserializeOwned>(endpoint: &str, body: Value) -> Result<Vec<T>> {
    let (shape, raw) = unwrap_list(body).map_err(|message| ApiError::Shape {
        endpoint: endpoint.to_string(),
        message,
    })?;

    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(endpoint, index, error = %e, "Skipping undecodable list element");
                None
            }
        })
        .collect();

    debug!(
        endpoint,
        shape = ?shape,
        total,
        decoded = items.len(),
        "Normalized list response"
    );
    Ok(items)
}

/// Unwrap a single-resource body and decode it.
pub fn normalize_object<T: DeserializeOwned>(endpoint: &str, body: Value) -> Result<T> {
    let shape_error = |message: String| ApiError::Shape {
        endpoint: endpoint.to_string(),
        message,
    };

    let (shape, raw) = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner @ Value::Object(_)) => (Shape::Data, inner),
            Some(Value::Null) | None => (Shape::Bare, Value::Object(map)),
            Some(other) => {
                return Err(shape_error(format!(
                    "expected object under `data`, got {}",
                    kind(&other)
                )))
            }
        },
        other => return Err(shape_error(format!("expected object, got {}", kind(&other)))),
    };

    debug!(endpoint, shape = ?shape, "Normalized object response");
    serde_json::from_value(raw).map_err(|e| shape_error(e.to_string()))
}

fn unwrap_list(body: Value) -> std::result::Result<(Shape, Vec<Value>), String> {
    match body {
        Value::Array(items) => Ok((Shape::Bare, items)),
        Value::Object(mut map) => {
            if let Some(data) = map.remove("data") {
                return match data {
                    Value::Array(items) => Ok((Shape::Data, items)),
                    Value::Null => Ok((Shape::Empty, Vec::new())),
                    Value::Object(mut inner) => match inner.remove("items") {
                        Some(Value::Array(items)) => Ok((Shape::DataItems, items)),
                        Some(other) => Err(format!(
                            "expected list under `data.items`, got {}",
                            kind(&other)
                        )),
                        None => Err("object under `data` has no `items` list".to_string()),
                    },
                    other => Err(format!("expected list under `data`, got {}", kind(&other))),
                };
            }
            match map.remove("items") {
                Some(Value::Array(items)) => Ok((Shape::Items, items)),
                Some(other) => Err(format!("expected list under `items`, got {}", kind(&other))),
                None => Err("object has neither `data` nor `items`".to_string()),
            }
        }
        other => Err(format!("expected list, got {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
