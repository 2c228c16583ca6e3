//! Workflow document builders.

use serde_json::{json, Value};
use uuid::Uuid;

use flowgate::models::credential::CredentialMapping;
use flowgate::models::promotion::PromotionRequest;
use flowgate::models::workflow::{Workflow, WorkflowSelection};

use super::EngineFixture;

/// A minimal workflow document whose content is distinguished by `marker`.
pub fn workflow_doc(id: &str, marker: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Workflow {id}"),
        "active": true,
        "updatedAt": updated_at,
        "nodes": [
            {
                "name": "Step",
                "type": "core.httpRequest",
                "parameters": {"url": format!("https://api.example.com/{marker}")}
            }
        ]
    })
}

pub fn workflow(id: &str, marker: &str, updated_at: &str) -> Workflow {
    Workflow::from_document(workflow_doc(id, marker, updated_at)).unwrap()
}

/// A workflow whose single node references a logical credential.
pub fn workflow_with_credential(
    id: &str,
    cred_type: &str,
    cred_name: &str,
    updated_at: &str,
) -> Workflow {
    Workflow::from_document(json!({
        "id": id,
        "name": format!("Workflow {id}"),
        "active": true,
        "updatedAt": updated_at,
        "nodes": [
            {
                "name": "Fetch",
                "type": "core.httpRequest",
                "parameters": {"url": "https://api.example.com"},
                "credentials": {cred_type: {"id": "cred-src", "name": cred_name}}
            }
        ]
    }))
    .unwrap()
}

pub fn mapping(
    target_environment_id: Uuid,
    cred_type: &str,
    logical_name: &str,
    physical_id: &str,
    physical_name: &str,
) -> CredentialMapping {
    CredentialMapping {
        logical_type: cred_type.into(),
        logical_name: logical_name.into(),
        target_environment_id,
        physical_id: physical_id.into(),
        physical_name: physical_name.into(),
        physical_type: cred_type.into(),
    }
}

pub fn request(fx: &EngineFixture, workflow_ids: &[&str]) -> PromotionRequest {
    PromotionRequest {
        stage_id: "staging-to-prod".into(),
        tenant_id: Uuid::new_v4(),
        source_environment_id: fx.source_id,
        target_environment_id: fx.target_id,
        selections: workflow_ids
            .iter()
            .map(|id| WorkflowSelection::candidate(*id, true))
            .collect(),
        conflicted_workflow_ids: vec![],
        requested_by: Some("release-bot".into()),
    }
}
