//! Event normalization for custom analytics events
//!
//! Custom events only accept flat string attributes, so nested player event
//! records are walked and joined into dotted keys.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat attribute map attached to custom events
pub type Attributes = BTreeMap<String, String>;

/// Key separator for nested fields
pub const SEPARATOR: char = '.';

/// Flatten a nested record into string attributes.
///
/// Objects are joined with `.`, arrays use their index as the key segment and
/// every leaf is stringified (`null` becomes `"null"`). A scalar root has no
/// keys and yields an empty map.
pub fn flatten(value: &Value) -> Attributes {
    let mut out = Attributes::new();
    match value {
        Value::Object(_) | Value::Array(_) => walk(None, value, &mut out),
        _ => {}
    }
    out
}

/// Serialize a record and flatten it
pub fn flatten_serializable<T: Serialize>(record: &T) -> Attributes {
    match serde_json::to_value(record) {
        Ok(value) => flatten(&value),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to serialize event for normalization");
            Attributes::new()
        }
    }
}

fn walk(prefix: Option<&str>, value: &Value, out: &mut Attributes) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = join(prefix, key);
                walk(Some(&path), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = join(prefix, &index.to_string());
                walk(Some(&path), child, out);
            }
        }
        leaf => {
            if let Some(key) = prefix {
                out.insert(key.to_string(), stringify(leaf));
            }
        }
    }
}

fn join(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) => format!("{p}{SEPARATOR}{key}"),
        None => key.to_string(),
    }
}

fn stringify(leaf: &Value) -> String {
    match leaf {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
