//! Workflow models: the opaque document the engine moves between
//! environments, plus the per-workflow selection record a promotion acts on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A workflow as returned by an environment's control API.
///
/// The engine treats the document as opaque JSON; only the identity and
/// lifecycle fields needed for comparison and promotion are lifted out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
    /// Full workflow definition, including the fields above
    pub document: serde_json::Value,
}

impl Workflow {
    /// Lift the identity fields out of a raw workflow document.
    pub fn from_document(document: serde_json::Value) -> Result<Self> {
        let obj = document
            .as_object()
            .ok_or_else(|| AppError::Validation("workflow document is not an object".into()))?;

        let id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("workflow document has no id".into()))?
            .to_string();
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(&id)
            .to_string();
        let active = obj.get("active").and_then(|v| v.as_bool()).unwrap_or(false);
        let updated_at = obj
            .get("updatedAt")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or_else(Utc::now);

        Ok(Self {
            id,
            name,
            active,
            updated_at,
            document,
        })
    }
}

/// Relationship of a workflow between source and target environments.
///
/// Mutually exclusive; computed once per promotion attempt from normalized
/// content and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClassification {
    /// No counterpart exists in the target
    New,
    /// Source modified; target still at the last common state
    Changed,
    /// Target modified more recently than source (a hotfix)
    TargetAhead,
    /// Both sides independently modified since the last common state
    Conflict,
    /// Normalized content digests match
    Unchanged,
}

impl std::fmt::Display for ChangeClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeClassification::New => "new",
            ChangeClassification::Changed => "changed",
            ChangeClassification::TargetAhead => "target_ahead",
            ChangeClassification::Conflict => "conflict",
            ChangeClassification::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// One candidate workflow within a promotion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSelection {
    pub workflow_id: String,
    pub workflow_name: String,
    pub classification: ChangeClassification,
    pub selected: bool,
    pub enabled_in_source: bool,
    pub enabled_in_target: bool,
    pub requires_overwrite: bool,
}

impl WorkflowSelection {
    /// A selection as submitted by a caller, before the comparator has
    /// filled in classification and enablement state.
    pub fn candidate(workflow_id: impl Into<String>, selected: bool) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            workflow_name: workflow_id.clone(),
            workflow_id,
            classification: ChangeClassification::Unchanged,
            selected,
            enabled_in_source: false,
            enabled_in_target: false,
            requires_overwrite: false,
        }
    }
}

/// Why a cross-workflow dependency was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyIssue {
    /// The referenced workflow does not exist in the target
    MissingFromTarget,
    /// The referenced workflow differs between source and target
    DiffersBetweenEnvironments,
    /// The referenced workflow was not selected for this promotion
    NotSelected,
}

/// Non-blocking warning about a "call another workflow" reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyWarning {
    /// Workflow containing the reference
    pub workflow_id: String,
    /// Workflow being referenced
    pub depends_on: String,
    pub issue: DependencyIssue,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_document_lifts_identity_fields() {
        let wf = Workflow::from_document(json!({
            "id": "wf-1",
            "name": "Order sync",
            "active": true,
            "updatedAt": "2026-01-10T12:00:00Z",
            "nodes": []
        }))
        .unwrap();

        assert_eq!(wf.id, "wf-1");
        assert_eq!(wf.name, "Order sync");
        assert!(wf.active);
        assert_eq!(wf.updated_at.to_rfc3339(), "2026-01-10T12:00:00+00:00");
    }

    #[test]
    fn test_from_document_defaults() {
        let wf = Workflow::from_document(json!({"id": "wf-2"})).unwrap();
        assert_eq!(wf.name, "wf-2");
        assert!(!wf.active);
    }

    #[test]
    fn test_from_document_rejects_missing_id() {
        assert!(Workflow::from_document(json!({"name": "x"})).is_err());
        assert!(Workflow::from_document(json!([1, 2])).is_err());
    }

    #[test]
    fn test_classification_serializes_snake_case() {
        let json = serde_json::to_value(ChangeClassification::TargetAhead).unwrap();
        assert_eq!(json, "target_ahead");
        assert_eq!(ChangeClassification::Conflict.to_string(), "conflict");
    }
}
