//! Audit recording.
//!
//! Every phase transition and decision emits a structured record to the
//! audit sink. Recording is fire-and-forget: a sink failure is logged but
//! never fails the promotion.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    // Job lifecycle
    PromotionInitiated,
    PromotionApproved,
    PromotionRejected,
    PromotionCancelled,
    PromotionStarted,
    PromotionCompleted,
    PromotionFailed,

    // Per-workflow decisions
    WorkflowPromoted,
    WorkflowSkipped,
    WorkflowPolicyBlocked,
    CredentialsRewritten,

    // Snapshots
    SnapshotCreated,
    SnapshotFailed,
    PostSnapshotFailed,

    // Rollback
    RollbackStarted,
    RollbackCompleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PromotionInitiated => "PROMOTION_INITIATED",
            AuditAction::PromotionApproved => "PROMOTION_APPROVED",
            AuditAction::PromotionRejected => "PROMOTION_REJECTED",
            AuditAction::PromotionCancelled => "PROMOTION_CANCELLED",
            AuditAction::PromotionStarted => "PROMOTION_STARTED",
            AuditAction::PromotionCompleted => "PROMOTION_COMPLETED",
            AuditAction::PromotionFailed => "PROMOTION_FAILED",
            AuditAction::WorkflowPromoted => "WORKFLOW_PROMOTED",
            AuditAction::WorkflowSkipped => "WORKFLOW_SKIPPED",
            AuditAction::WorkflowPolicyBlocked => "WORKFLOW_POLICY_BLOCKED",
            AuditAction::CredentialsRewritten => "CREDENTIALS_REWRITTEN",
            AuditAction::SnapshotCreated => "SNAPSHOT_CREATED",
            AuditAction::SnapshotFailed => "SNAPSHOT_FAILED",
            AuditAction::PostSnapshotFailed => "POST_SNAPSHOT_FAILED",
            AuditAction::RollbackStarted => "ROLLBACK_STARTED",
            AuditAction::RollbackCompleted => "ROLLBACK_COMPLETED",
        }
    }
}

/// External audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        action: AuditAction,
        resource_id: Option<Uuid>,
        result: &str,
        metadata: serde_json::Value,
    ) -> Result<()>;
}

/// Record an audit entry, logging instead of propagating on sink failure.
pub async fn record_or_log(
    sink: &dyn AuditSink,
    action: AuditAction,
    resource_id: Option<Uuid>,
    result: &str,
    metadata: serde_json::Value,
) {
    if let Err(e) = sink.record(action, resource_id, result, metadata).await {
        tracing::warn!(
            action = action.as_str(),
            error = %e,
            "failed to write audit record"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_are_stable() {
        assert_eq!(AuditAction::PromotionInitiated.as_str(), "PROMOTION_INITIATED");
        assert_eq!(AuditAction::WorkflowPolicyBlocked.as_str(), "WORKFLOW_POLICY_BLOCKED");
        assert_eq!(AuditAction::RollbackCompleted.as_str(), "ROLLBACK_COMPLETED");
    }
}
