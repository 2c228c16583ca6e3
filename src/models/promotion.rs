//! Promotion models: the immutable request, the stage policy, gate results,
//! and the `PromotionJob` state machine record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rollback::RollbackResult;
use super::workflow::{DependencyWarning, WorkflowSelection};

/// Immutable input to a promotion: which workflows move from which source
/// environment to which target, in which order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRequest {
    /// Pipeline stage identifier (e.g. "staging-to-prod")
    pub stage_id: String,
    pub tenant_id: Uuid,
    pub source_environment_id: Uuid,
    pub target_environment_id: Uuid,
    /// Ordered candidate workflows; the comparator fills in classification
    pub selections: Vec<WorkflowSelection>,
    /// Workflows the drift subsystem has marked as independently modified
    /// on both sides since the last common state
    pub conflicted_workflow_ids: Vec<String>,
    pub requested_by: Option<String>,
}

/// Per-stage promotion policy flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StagePolicy {
    /// Whether a job must be approved before it can execute
    pub require_approval: bool,
    /// Allow overwriting target workflows modified more recently than source
    pub allow_hotfix_overwrite: bool,
    /// Allow force-promoting workflows in conflict
    pub allow_force_conflicts: bool,
    /// Create placeholder credentials for unmapped references instead of
    /// failing the credential-coverage gate
    pub allow_placeholder_credentials: bool,
}

/// Pre-flight gates run at initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    TargetReachability,
    CredentialCoverage,
    DriftPolicy,
    NodeCompatibility,
    WebhookAvailability,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::TargetReachability => "target_reachability",
            GateKind::CredentialCoverage => "credential_coverage",
            GateKind::DriftPolicy => "drift_policy",
            GateKind::NodeCompatibility => "node_compatibility",
            GateKind::WebhookAvailability => "webhook_availability",
        }
    }
}

/// Pass/fail decision of a single gate, kept on the job for approver review
/// and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateKind,
    pub passed: bool,
    pub reason: Option<String>,
    pub warning: Option<String>,
}

impl GateResult {
    pub fn pass(gate: GateKind) -> Self {
        Self {
            gate,
            passed: true,
            reason: None,
            warning: None,
        }
    }

    pub fn pass_with_warning(gate: GateKind, warning: impl Into<String>) -> Self {
        Self {
            gate,
            passed: true,
            reason: None,
            warning: Some(warning.into()),
        }
    }

    pub fn fail(gate: GateKind, reason: impl Into<String>) -> Self {
        Self {
            gate,
            passed: false,
            reason: Some(reason.into()),
            warning: None,
        }
    }
}

/// Promotion job status enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    Pending,
    PendingApproval,
    Approved,
    Running,
    Completed,
    Failed,
    Rejected,
    Cancelled,
}

impl PromotionStatus {
    /// Terminal states are final; no job transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PromotionStatus::Completed
                | PromotionStatus::Failed
                | PromotionStatus::Rejected
                | PromotionStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: PromotionStatus) -> bool {
        use PromotionStatus::*;
        matches!(
            (self, next),
            (Pending, PendingApproval)
                | (Pending, Running)
                | (Pending, Cancelled)
                // Execution-time failures before the loop starts (drift
                // re-check blocked, pre-promotion snapshot failed) fail the
                // job without it ever reaching running
                | (Pending, Failed)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Running)
                | (Approved, Failed)
                | (Running, Completed)
                | (Running, Failed)
        )
    }
}

impl std::fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PromotionStatus::Pending => "pending",
            PromotionStatus::PendingApproval => "pending_approval",
            PromotionStatus::Approved => "approved",
            PromotionStatus::Running => "running",
            PromotionStatus::Completed => "completed",
            PromotionStatus::Failed => "failed",
            PromotionStatus::Rejected => "rejected",
            PromotionStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A workflow that failed inside the execution loop, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub workflow_id: String,
    pub message: String,
}

/// Why a workflow was skipped without being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Deselected by the caller
    NotSelected,
    /// A structurally identical workflow already exists in the target
    AlreadyPresent,
    /// The specific target workflow is identical to the source
    Unchanged,
}

/// A workflow skipped by the execution loop. Skips are informational, not
/// errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSkip {
    pub workflow_id: String,
    pub reason: SkipReason,
}

/// Mutable state-machine instance tracking one promotion attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub stage_id: String,
    pub source_environment_id: Uuid,
    pub target_environment_id: Uuid,
    pub status: PromotionStatus,
    pub policy: StagePolicy,
    pub selections: Vec<WorkflowSelection>,
    pub gate_results: Vec<GateResult>,
    pub dependency_warnings: Vec<DependencyWarning>,
    /// Auto-backup snapshot of the source taken at initiation; pins the
    /// commit every comparison and write reads source content from
    pub source_snapshot_id: Option<Uuid>,
    pub source_commit: Option<String>,
    pub pre_snapshot_id: Option<Uuid>,
    pub post_snapshot_id: Option<Uuid>,
    /// Append-only, in true completion order; drives rollback
    pub promoted: Vec<String>,
    pub failed: Vec<WorkflowFailure>,
    pub skipped: Vec<WorkflowSkip>,
    pub rollback: Option<RollbackResult>,
    pub warnings: Vec<String>,
    /// Job-level failure message when the attempt ended in `Failed`
    pub error: Option<String>,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromotionJob {
    pub fn new(request: &PromotionRequest, policy: StagePolicy) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            stage_id: request.stage_id.clone(),
            source_environment_id: request.source_environment_id,
            target_environment_id: request.target_environment_id,
            status: PromotionStatus::Pending,
            policy,
            selections: request.selections.clone(),
            gate_results: vec![],
            dependency_warnings: vec![],
            source_snapshot_id: None,
            source_commit: None,
            pre_snapshot_id: None,
            post_snapshot_id: None,
            promoted: vec![],
            failed: vec![],
            skipped: vec![],
            rollback: None,
            warnings: vec![],
            error: None,
            requested_by: request.requested_by.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every blocking gate passed. Warnings do not block.
    pub fn gates_passed(&self) -> bool {
        self.gate_results.iter().all(|g| g.passed)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What `execute` hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub job: PromotionJob,
    /// Per-node credential rewrites applied during this attempt
    pub credential_rewrites: Vec<crate::services::credential_rewriter::NodeCredentialDiff>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_final() {
        use PromotionStatus::*;
        for terminal in [Completed, Failed, Rejected, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                Pending,
                PendingApproval,
                Approved,
                Running,
                Completed,
                Failed,
                Rejected,
                Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} must not transition to {next}"
                );
            }
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        use PromotionStatus::*;
        assert!(Pending.can_transition_to(PendingApproval));
        assert!(PendingApproval.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
    }

    #[test]
    fn test_side_branch_transitions() {
        use PromotionStatus::*;
        // Approval-less stages execute straight from pending
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(PendingApproval.can_transition_to(Rejected));
        // Pre-loop execution failures
        assert!(Pending.can_transition_to(Failed));
        assert!(Approved.can_transition_to(Failed));
        // Cancellation is only valid pre-execution
        assert!(!Running.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Cancelled));
    }

    #[test]
    fn test_illegal_transitions() {
        use PromotionStatus::*;
        assert!(!Pending.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Completed));
        assert!(!PendingApproval.can_transition_to(Running));
    }

    #[test]
    fn test_gates_passed_ignores_warnings() {
        let request = PromotionRequest {
            stage_id: "dev-to-staging".into(),
            tenant_id: Uuid::new_v4(),
            source_environment_id: Uuid::new_v4(),
            target_environment_id: Uuid::new_v4(),
            selections: vec![],
            conflicted_workflow_ids: vec![],
            requested_by: None,
        };
        let mut job = PromotionJob::new(&request, StagePolicy::default());
        job.gate_results = vec![
            GateResult::pass(GateKind::TargetReachability),
            GateResult::pass_with_warning(GateKind::DriftPolicy, "check failed; allowing"),
        ];
        assert!(job.gates_passed());

        job.gate_results
            .push(GateResult::fail(GateKind::CredentialCoverage, "unmapped"));
        assert!(!job.gates_passed());
    }
}
