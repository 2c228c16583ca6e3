//! Workflow comparison: change classification and cross-workflow dependency
//! detection.

use std::collections::{HashMap, HashSet};

use crate::models::workflow::{
    ChangeClassification, DependencyIssue, DependencyWarning, Workflow,
};
use crate::services::normalizer::content_hash;

/// Classify one workflow's relationship between source and target.
///
/// `source` is the version pinned at a version-store commit, never the live
/// source runtime, so the comparison is stable for the whole attempt.
/// `conflict_marked` is the drift subsystem's record of independent
/// modification on both sides.
pub fn classify(
    source: &Workflow,
    target: Option<&Workflow>,
    conflict_marked: bool,
) -> ChangeClassification {
    let Some(target) = target else {
        return ChangeClassification::New;
    };

    if content_hash(&source.document) == content_hash(&target.document) {
        return ChangeClassification::Unchanged;
    }

    if conflict_marked {
        return ChangeClassification::Conflict;
    }

    if target.updated_at > source.updated_at {
        ChangeClassification::TargetAhead
    } else {
        ChangeClassification::Changed
    }
}

/// Ids of workflows called from this document via execute-workflow nodes.
pub fn called_workflow_ids(document: &serde_json::Value) -> Vec<String> {
    let Some(nodes) = document.get("nodes").and_then(|n| n.as_array()) else {
        return vec![];
    };

    nodes
        .iter()
        .filter(|node| {
            node.get("type")
                .and_then(|t| t.as_str())
                .map(|t| t == "executeWorkflow" || t.ends_with(".executeWorkflow"))
                .unwrap_or(false)
        })
        .filter_map(|node| {
            node.get("parameters")
                .and_then(|p| p.get("workflowId"))
                .and_then(|id| id.as_str())
                .map(|id| id.to_string())
        })
        .collect()
}

/// Scan selected source workflows for call-another-workflow references and
/// flag, as non-blocking warnings, callees that are missing from the target,
/// differ between environments, or were not themselves selected.
pub fn detect_dependencies(
    selected_sources: &[Workflow],
    all_sources: &[Workflow],
    targets: &[Workflow],
    selected_ids: &HashSet<String>,
) -> Vec<DependencyWarning> {
    let source_by_id: HashMap<&str, &Workflow> =
        all_sources.iter().map(|w| (w.id.as_str(), w)).collect();
    let target_by_id: HashMap<&str, &Workflow> =
        targets.iter().map(|w| (w.id.as_str(), w)).collect();

    let mut warnings = Vec::new();
    for workflow in selected_sources {
        for callee_id in called_workflow_ids(&workflow.document) {
            let callee_target = target_by_id.get(callee_id.as_str());
            let callee_source = source_by_id.get(callee_id.as_str());

            if callee_target.is_none() {
                warnings.push(DependencyWarning {
                    workflow_id: workflow.id.clone(),
                    depends_on: callee_id.clone(),
                    issue: DependencyIssue::MissingFromTarget,
                    message: format!(
                        "{} calls {callee_id}, which does not exist in the target environment",
                        workflow.name
                    ),
                });
            } else if let (Some(src), Some(tgt)) = (callee_source, callee_target) {
                if content_hash(&src.document) != content_hash(&tgt.document) {
                    warnings.push(DependencyWarning {
                        workflow_id: workflow.id.clone(),
                        depends_on: callee_id.clone(),
                        issue: DependencyIssue::DiffersBetweenEnvironments,
                        message: format!(
                            "{} calls {callee_id}, which differs between source and target",
                            workflow.name
                        ),
                    });
                }
            }

            if !selected_ids.contains(&callee_id) {
                warnings.push(DependencyWarning {
                    workflow_id: workflow.id.clone(),
                    depends_on: callee_id.clone(),
                    issue: DependencyIssue::NotSelected,
                    message: format!(
                        "{} calls {callee_id}, which is not selected for this promotion",
                        workflow.name
                    ),
                });
            }
        }
    }
    warnings
}
