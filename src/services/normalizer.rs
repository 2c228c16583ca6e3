//! Workflow normalization and content hashing.
//!
//! Strips environment-specific and volatile fields so two workflow documents
//! can be meaningfully compared or hashed. Pure and side-effect-free.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Identity, versioning, and runtime-state fields that differ between
/// structurally identical workflows.
const VOLATILE_TOP_LEVEL: &[&str] = &[
    "id",
    "createdAt",
    "updatedAt",
    "versionId",
    "triggerCount",
    "staticData",
    "active",
    "tags",
    "pinData",
    "meta",
    "shared",
];

/// Per-node fields that are UI state or environment-assigned identity.
const VOLATILE_NODE_FIELDS: &[&str] = &["id", "position", "positionAbsolute", "selected", "webhookId"];

/// Canonicalize a workflow document.
///
/// Removes volatile top-level and node fields, reduces credential references
/// to `{type, name}` so IDs that differ per environment do not affect the
/// digest, and sorts nodes by name to remove order sensitivity.
pub fn normalize(document: &Value) -> Value {
    let Some(obj) = document.as_object() else {
        return document.clone();
    };

    let mut normalized = Map::new();
    for (key, value) in obj {
        if VOLATILE_TOP_LEVEL.contains(&key.as_str()) {
            continue;
        }
        if key == "nodes" {
            normalized.insert(key.clone(), normalize_nodes(value));
        } else {
            normalized.insert(key.clone(), value.clone());
        }
    }
    Value::Object(normalized)
}

fn normalize_nodes(nodes: &Value) -> Value {
    let Some(array) = nodes.as_array() else {
        return nodes.clone();
    };

    let mut normalized: Vec<Value> = array.iter().map(normalize_node).collect();
    normalized.sort_by(|a, b| node_name(a).cmp(&node_name(b)));
    Value::Array(normalized)
}

fn normalize_node(node: &Value) -> Value {
    let Some(obj) = node.as_object() else {
        return node.clone();
    };

    let mut normalized = Map::new();
    for (key, value) in obj {
        if VOLATILE_NODE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if key == "credentials" {
            normalized.insert(key.clone(), normalize_credentials(value));
        } else {
            normalized.insert(key.clone(), value.clone());
        }
    }
    Value::Object(normalized)
}

/// Reduce each credential reference to its name; the map key already carries
/// the type.
fn normalize_credentials(credentials: &Value) -> Value {
    let Some(obj) = credentials.as_object() else {
        return credentials.clone();
    };

    let mut normalized = Map::new();
    for (cred_type, reference) in obj {
        let name = reference.get("name").cloned().unwrap_or(Value::Null);
        let mut reduced = Map::new();
        reduced.insert("name".to_string(), name);
        normalized.insert(cred_type.clone(), Value::Object(reduced));
    }
    Value::Object(normalized)
}

fn node_name(node: &Value) -> String {
    node.get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// SHA-256 hex digest of the normalized document.
///
/// serde_json's map is BTreeMap-backed, so serialization of the normalized
/// document has deterministic key ordering; equal digests mean "identical
/// for promotion purposes".
pub fn content_hash(document: &Value) -> String {
    let normalized = normalize(document);
    let serialized = normalized.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    hex::encode(digest)
}
