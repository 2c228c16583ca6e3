//! Credential rewriting: maps logical credential references in a workflow
//! document to the physical credentials of the target environment.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::models::credential::{CredentialKey, CredentialMapping};

/// Immutable snapshot of the mapping table, loaded once per promotion
/// attempt so concurrent mapping changes do not affect an in-flight loop.
pub struct CredentialLookup {
    by_logical_key: HashMap<String, CredentialMapping>,
}

impl CredentialLookup {
    pub fn new(mappings: Vec<CredentialMapping>) -> Self {
        Self {
            by_logical_key: mappings
                .into_iter()
                .map(|m| (m.logical_key(), m))
                .collect(),
        }
    }

    pub fn resolve(&self, key: &CredentialKey) -> Option<&CredentialMapping> {
        self.by_logical_key.get(&key.logical_key())
    }

    pub fn is_empty(&self) -> bool {
        self.by_logical_key.is_empty()
    }
}

/// Before/after record of one node's credential reference, kept for audit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeCredentialDiff {
    pub workflow_id: String,
    pub node_name: String,
    pub credential_type: String,
    pub before: Value,
    pub after: Value,
}

/// Result of rewriting one workflow document.
pub struct RewriteOutcome {
    pub document: Value,
    pub diffs: Vec<NodeCredentialDiff>,
    /// Logical references with no mapping for the target; left untouched
    pub unmapped: Vec<CredentialKey>,
}

/// Every logical credential reference in a workflow document.
pub fn collect_credential_keys(document: &Value) -> Vec<CredentialKey> {
    let Some(nodes) = document.get("nodes").and_then(|n| n.as_array()) else {
        return vec![];
    };

    let mut keys = Vec::new();
    for node in nodes {
        let Some(credentials) = node.get("credentials").and_then(|c| c.as_object()) else {
            continue;
        };
        for (cred_type, reference) in credentials {
            if let Some(name) = reference.get("name").and_then(|n| n.as_str()) {
                let key = CredentialKey::new(cred_type.clone(), name);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

/// Rewrite every node's credential references against the lookup.
///
/// Mapped references get the physical name/id/type of the target
/// environment; unmapped references are left untouched and reported so the
/// caller can decide on placeholders.
pub fn rewrite_credentials(
    workflow_id: &str,
    document: &Value,
    lookup: &CredentialLookup,
) -> RewriteOutcome {
    let mut document = document.clone();
    let mut diffs = Vec::new();
    let mut unmapped = Vec::new();

    let nodes = document
        .get_mut("nodes")
        .and_then(|n| n.as_array_mut())
        .map(std::mem::take)
        .unwrap_or_default();

    let mut rewritten_nodes = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        let node_name = node
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();

        if let Some(credentials) = node.get_mut("credentials").and_then(|c| c.as_object_mut()) {
            let original = credentials.clone();
            let mut rewritten = Map::new();

            for (cred_type, reference) in &original {
                let Some(name) = reference.get("name").and_then(|n| n.as_str()) else {
                    rewritten.insert(cred_type.clone(), reference.clone());
                    continue;
                };
                let key = CredentialKey::new(cred_type.clone(), name);

                match lookup.resolve(&key) {
                    Some(mapping) => {
                        let after = serde_json::json!({
                            "id": mapping.physical_id,
                            "name": mapping.physical_name,
                        });
                        diffs.push(NodeCredentialDiff {
                            workflow_id: workflow_id.to_string(),
                            node_name: node_name.clone(),
                            credential_type: cred_type.clone(),
                            before: reference.clone(),
                            after: after.clone(),
                        });
                        // The map key carries the type; re-key if the
                        // physical credential is of a different type
                        rewritten.insert(mapping.physical_type.clone(), after);
                    }
                    None => {
                        if !unmapped.contains(&key) {
                            unmapped.push(key);
                        }
                        rewritten.insert(cred_type.clone(), reference.clone());
                    }
                }
            }
            *credentials = rewritten;
        }
        rewritten_nodes.push(node);
    }

    if let Some(nodes_slot) = document.get_mut("nodes") {
        *nodes_slot = Value::Array(rewritten_nodes);
    }

    RewriteOutcome {
        document,
        diffs,
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn mapping(logical: &str, physical_id: &str, physical_name: &str) -> CredentialMapping {
        CredentialMapping {
            logical_type: "httpBasicAuth".into(),
            logical_name: logical.into(),
            target_environment_id: Uuid::new_v4(),
            physical_id: physical_id.into(),
            physical_name: physical_name.into(),
            physical_type: "httpBasicAuth".into(),
        }
    }

    fn document() -> Value {
        json!({
            "id": "wf-1",
            "name": "Order sync",
            "nodes": [
                {
                    "name": "Fetch",
                    "type": "core.httpRequest",
                    "credentials": {
                        "httpBasicAuth": {"id": "cred-dev-1", "name": "crm-api"}
                    }
                },
                {
                    "name": "Push",
                    "type": "core.httpRequest",
                    "credentials": {
                        "httpBasicAuth": {"id": "cred-dev-2", "name": "erp-api"}
                    }
                }
            ]
        })
    }

    #[test]
    fn test_mapped_references_are_rewritten() {
        let lookup = CredentialLookup::new(vec![
            mapping("crm-api", "cred-prod-1", "crm-api (prod)"),
            mapping("erp-api", "cred-prod-2", "erp-api (prod)"),
        ]);
        let outcome = rewrite_credentials("wf-1", &document(), &lookup);

        assert!(outcome.unmapped.is_empty());
        assert_eq!(outcome.diffs.len(), 2);
        assert_eq!(
            outcome.document["nodes"][0]["credentials"]["httpBasicAuth"],
            json!({"id": "cred-prod-1", "name": "crm-api (prod)"})
        );
    }

    #[test]
    fn test_unmapped_references_left_untouched() {
        let lookup = CredentialLookup::new(vec![mapping("crm-api", "cred-prod-1", "crm-api (prod)")]);
        let outcome = rewrite_credentials("wf-1", &document(), &lookup);

        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(outcome.unmapped, vec![CredentialKey::new("httpBasicAuth", "erp-api")]);
        // erp-api reference unchanged
        assert_eq!(
            outcome.document["nodes"][1]["credentials"]["httpBasicAuth"],
            json!({"id": "cred-dev-2", "name": "erp-api"})
        );
    }

    #[test]
    fn test_diffs_record_before_and_after() {
        let lookup = CredentialLookup::new(vec![mapping("crm-api", "cred-prod-1", "crm-api (prod)")]);
        let outcome = rewrite_credentials("wf-1", &document(), &lookup);

        let diff = &outcome.diffs[0];
        assert_eq!(diff.node_name, "Fetch");
        assert_eq!(diff.before, json!({"id": "cred-dev-1", "name": "crm-api"}));
        assert_eq!(diff.after, json!({"id": "cred-prod-1", "name": "crm-api (prod)"}));
    }

    #[test]
    fn test_type_rekeying() {
        let mut m = mapping("crm-api", "cred-prod-1", "crm-api (prod)");
        m.physical_type = "httpHeaderAuth".into();
        let lookup = CredentialLookup::new(vec![m]);
        let outcome = rewrite_credentials("wf-1", &document(), &lookup);

        let creds = outcome.document["nodes"][0]["credentials"].as_object().unwrap();
        assert!(creds.contains_key("httpHeaderAuth"));
        assert!(!creds.contains_key("httpBasicAuth"));
    }

    #[test]
    fn test_collect_credential_keys_deduplicates() {
        let doc = json!({
            "nodes": [
                {"name": "A", "credentials": {"httpBasicAuth": {"name": "crm-api"}}},
                {"name": "B", "credentials": {"httpBasicAuth": {"name": "crm-api"}}},
                {"name": "C", "credentials": {"apiKey": {"name": "billing"}}},
                {"name": "D"}
            ]
        });
        let keys = collect_credential_keys(&doc);
        assert_eq!(
            keys,
            vec![
                CredentialKey::new("httpBasicAuth", "crm-api"),
                CredentialKey::new("apiKey", "billing"),
            ]
        );
    }

    #[test]
    fn test_document_without_nodes() {
        let lookup = CredentialLookup::new(vec![]);
        let outcome = rewrite_credentials("wf-1", &json!({"name": "empty"}), &lookup);
        assert!(outcome.diffs.is_empty());
        assert!(outcome.unmapped.is_empty());
        assert!(collect_credential_keys(&json!({"name": "empty"})).is_empty());
    }
}
