//! Promotion orchestration: initiation, approval, and the atomic execution
//! loop.
//!
//! Policy violations and idempotency skips are soft outcomes that let the
//! loop continue; infrastructure failures are hard outcomes that trigger a
//! full rollback of everything promoted so far in the attempt. Validation
//! failures are recoverable by configuration change, while provider failures
//! leave the target in an unknown state that must be reverted.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::environments::{EnvironmentAdapter, EnvironmentResolver};
use crate::error::{AppError, Result};
use crate::models::promotion::{
    ExecutionResult, PromotionJob, PromotionRequest, PromotionStatus, StagePolicy,
    WorkflowFailure, WorkflowSkip, SkipReason,
};
use crate::models::snapshot::{Snapshot, SnapshotType};
use crate::models::workflow::{ChangeClassification, Workflow};
use crate::ports::{CredentialDirectory, DriftPolicyService, EnforcementOutcome};
use crate::services::audit_service::{record_or_log, AuditAction, AuditSink};
use crate::services::comparator::{classify, detect_dependencies};
use crate::services::credential_rewriter::{
    rewrite_credentials, CredentialLookup, NodeCredentialDiff, RewriteOutcome,
};
use crate::services::gate_service::{GateContext, GateService};
use crate::services::normalizer::content_hash;
use crate::services::retry::{RetryConfig, Sleeper};
use crate::services::rollback_service::RollbackService;
use crate::services::snapshot_service::SnapshotService;
use crate::store::PromotionStore;
use crate::vcs::VersionStore;

pub struct PromotionService {
    resolver: Arc<dyn EnvironmentResolver>,
    store: Arc<dyn PromotionStore>,
    snapshots: Arc<SnapshotService>,
    rollback: Arc<RollbackService>,
    gates: GateService,
    drift: Arc<dyn DriftPolicyService>,
    credentials: Arc<dyn CredentialDirectory>,
    audit: Arc<dyn AuditSink>,
}

impl PromotionService {
    /// Wire the engine. The snapshot and rollback services are built here so
    /// the path prefix and the rollback retry knobs come from one `Config`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<dyn EnvironmentResolver>,
        store: Arc<dyn PromotionStore>,
        vcs: Arc<dyn VersionStore>,
        drift: Arc<dyn DriftPolicyService>,
        credentials: Arc<dyn CredentialDirectory>,
        audit: Arc<dyn AuditSink>,
        sleeper: Arc<dyn Sleeper>,
        config: &Config,
    ) -> Self {
        let snapshots = Arc::new(SnapshotService::new(
            vcs,
            store.clone(),
            config.vcs_path_prefix.clone(),
        ));
        let rollback = Arc::new(RollbackService::new(
            snapshots.clone(),
            store.clone(),
            RetryConfig::rollback(config),
            sleeper,
        ));
        Self {
            resolver,
            store,
            snapshots,
            rollback,
            gates: GateService::new(Duration::from_secs(config.health_check_timeout_secs)),
            drift,
            credentials,
            audit,
        }
    }

    /// Create a promotion job: pin the source content in an auto-backup
    /// snapshot, classify every selection, detect dependency issues, and run
    /// the pre-flight gates. The job is persisted with all gate results even
    /// when a gate fails, so the evidence stays reviewable.
    pub async fn initiate(
        &self,
        request: PromotionRequest,
        policy: StagePolicy,
    ) -> Result<PromotionJob> {
        let source = self.resolver.adapter_for(request.source_environment_id).await?;
        let target = self.resolver.adapter_for(request.target_environment_id).await?;

        let mut job = PromotionJob::new(&request, policy);
        tracing::info!(
            job_id = %job.id,
            stage = %job.stage_id,
            source = %job.source_environment_id,
            target = %job.target_environment_id,
            "initiating promotion"
        );

        // Pin the source content: every later comparison and write reads
        // from this snapshot's commit, never the live source runtime
        let source_workflows = source.get_workflows().await?;
        let source_snapshot = self
            .snapshots
            .create_snapshot(
                request.source_environment_id,
                &source_workflows,
                SnapshotType::AutoBackup,
                request.requested_by.clone(),
            )
            .await?;
        job.source_snapshot_id = Some(source_snapshot.id);
        job.source_commit = Some(source_snapshot.commit_id.clone());

        let source_by_id: HashMap<&str, &Workflow> =
            source_workflows.iter().map(|w| (w.id.as_str(), w)).collect();
        for selection in &job.selections {
            if !source_by_id.contains_key(selection.workflow_id.as_str()) {
                return Err(AppError::Validation(format!(
                    "workflow {} does not exist in the source environment",
                    selection.workflow_id
                )));
            }
        }

        // Classification is the authoritative input to the policy checks;
        // without the target inventory there is nothing honest to classify
        // against, so the job is not created at all
        let target_workflows = target.get_workflows().await.map_err(|e| {
            tracing::error!(
                job_id = %job.id,
                error = %e,
                "target inventory unavailable, refusing to initiate"
            );
            e
        })?;

        let conflicted: HashSet<&str> = request
            .conflicted_workflow_ids
            .iter()
            .map(|s| s.as_str())
            .collect();
        let target_by_id: HashMap<&str, &Workflow> = target_workflows
            .iter()
            .map(|w| (w.id.as_str(), w))
            .collect();
        for selection in &mut job.selections {
            let src = source_by_id[selection.workflow_id.as_str()];
            let tgt = target_by_id.get(selection.workflow_id.as_str()).copied();
            selection.workflow_name = src.name.clone();
            selection.classification =
                classify(src, tgt, conflicted.contains(selection.workflow_id.as_str()));
            selection.enabled_in_source = src.active;
            selection.enabled_in_target = tgt.map(|t| t.active).unwrap_or(false);
        }

        let selected_ids: HashSet<String> = job
            .selections
            .iter()
            .filter(|s| s.selected)
            .map(|s| s.workflow_id.clone())
            .collect();
        let selected_sources: Vec<Workflow> = source_workflows
            .iter()
            .filter(|w| selected_ids.contains(&w.id))
            .cloned()
            .collect();
        job.dependency_warnings = detect_dependencies(
            &selected_sources,
            &source_workflows,
            &target_workflows,
            &selected_ids,
        );

        let ctx = GateContext {
            tenant_id: job.tenant_id,
            target_environment_id: job.target_environment_id,
            correlation_id: job.id,
            policy: job.policy,
            selected_sources: &selected_sources,
            target_workflows: &target_workflows,
            target: target.as_ref(),
            drift: self.drift.as_ref(),
            credentials: self.credentials.as_ref(),
        };
        job.gate_results = self.gates.run_gates(&ctx).await;

        if job.policy.require_approval {
            self.transition(&mut job, PromotionStatus::PendingApproval).await?;
        } else {
            self.store.put_job(&job).await?;
        }

        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionInitiated,
            Some(job.id),
            if job.gates_passed() { "success" } else { "gates_failed" },
            json!({
                "stage": job.stage_id,
                "source_environment": job.source_environment_id,
                "target_environment": job.target_environment_id,
                "selections": job.selections.len(),
                "gates_passed": job.gates_passed(),
            }),
        )
        .await;
        Ok(job)
    }

    pub async fn approve(&self, job_id: Uuid) -> Result<PromotionJob> {
        let mut job = self.store.get_job(job_id).await?;
        self.transition(&mut job, PromotionStatus::Approved).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionApproved,
            Some(job.id),
            "success",
            json!({"stage": job.stage_id}),
        )
        .await;
        Ok(job)
    }

    pub async fn reject(&self, job_id: Uuid) -> Result<PromotionJob> {
        let mut job = self.store.get_job(job_id).await?;
        self.transition(&mut job, PromotionStatus::Rejected).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionRejected,
            Some(job.id),
            "success",
            json!({"stage": job.stage_id}),
        )
        .await;
        Ok(job)
    }

    /// Abort a job that has not started executing.
    pub async fn cancel(&self, job_id: Uuid) -> Result<PromotionJob> {
        let mut job = self.store.get_job(job_id).await?;
        self.transition(&mut job, PromotionStatus::Cancelled).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionCancelled,
            Some(job.id),
            "success",
            json!({"stage": job.stage_id}),
        )
        .await;
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<PromotionJob> {
        self.store.get_job(job_id).await
    }

    /// Run the atomic execution loop for a job whose gates all passed.
    ///
    /// Execution failures surface as a `Failed` job on the returned result,
    /// not as an `Err`; `Err` is reserved for refusals (wrong state, failed
    /// gates) and storage faults.
    pub async fn execute(&self, job_id: Uuid) -> Result<ExecutionResult> {
        let mut job = self.store.get_job(job_id).await?;
        if !job.status.can_transition_to(PromotionStatus::Running) {
            return Err(AppError::Conflict(format!(
                "job {} cannot execute from state {}",
                job.id, job.status
            )));
        }
        if !job.gates_passed() {
            return Err(AppError::Validation(
                "a blocking gate failed; promotion may not execute".into(),
            ));
        }

        let target = self.resolver.adapter_for(job.target_environment_id).await?;

        // Drift enforcement is re-verified at execution time, beyond the
        // initiation-time gate. A check failure is allowed-with-warning: an
        // outage of the policy service must not block promotions.
        match self
            .drift
            .check_enforcement(job.tenant_id, job.target_environment_id, job.id)
            .await
        {
            EnforcementOutcome::Allowed => {}
            EnforcementOutcome::Blocked { reason } => {
                return self
                    .fail_job(job, format!("drift policy blocked execution: {reason}"))
                    .await;
            }
            EnforcementOutcome::CheckFailed { error } => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %error,
                    "drift enforcement re-check failed; allowing execution"
                );
                job.warnings
                    .push(format!("drift enforcement re-check failed, allowing: {error}"));
            }
        }

        // No target mutation may happen before the pre-promotion snapshot
        // is persisted
        let target_inventory = match target.get_workflows().await {
            Ok(w) => w,
            Err(e) => {
                return self
                    .fail_job(job, format!("could not inventory target environment: {e}"))
                    .await;
            }
        };
        let pre_snapshot = match self
            .snapshots
            .create_snapshot(
                job.target_environment_id,
                &target_inventory,
                SnapshotType::PrePromotion,
                job.requested_by.clone(),
            )
            .await
        {
            Ok(s) => s,
            Err(e) => {
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::SnapshotFailed,
                    Some(job.id),
                    "failure",
                    json!({"snapshot_type": "pre_promotion", "error": e.to_string()}),
                )
                .await;
                return self
                    .fail_job(job, format!("pre-promotion snapshot failed: {e}"))
                    .await;
            }
        };
        job.pre_snapshot_id = Some(pre_snapshot.id);
        record_or_log(
            self.audit.as_ref(),
            AuditAction::SnapshotCreated,
            Some(job.id),
            "success",
            json!({
                "snapshot_id": pre_snapshot.id,
                "snapshot_type": "pre_promotion",
                "workflows": pre_snapshot.workflows.len(),
            }),
        )
        .await;

        self.transition(&mut job, PromotionStatus::Running).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionStarted,
            Some(job.id),
            "success",
            json!({"pre_snapshot_id": pre_snapshot.id}),
        )
        .await;

        // Mappings are loaded once and held immutable for the whole loop;
        // concurrent changes to the mapping table do not affect this attempt
        let lookup = match self
            .credentials
            .list_mappings(job.tenant_id, job.target_environment_id)
            .await
        {
            Ok(mappings) => CredentialLookup::new(mappings),
            Err(e) => {
                return self
                    .fail_job(job, format!("could not load credential mappings: {e}"))
                    .await;
            }
        };

        let source_snapshot_id = job
            .source_snapshot_id
            .ok_or_else(|| AppError::Internal(format!("job {} has no source snapshot", job.id)))?;
        let source_snapshot = match self.store.get_snapshot(source_snapshot_id).await {
            Ok(s) => s,
            Err(e) => {
                return self
                    .fail_job(job, format!("source snapshot unavailable: {e}"))
                    .await;
            }
        };

        let target_by_id: HashMap<String, &Workflow> = target_inventory
            .iter()
            .map(|w| (w.id.clone(), w))
            .collect();
        let target_digests: HashSet<String> = target_inventory
            .iter()
            .map(|w| content_hash(&w.document))
            .collect();

        let mut rewrites: Vec<NodeCredentialDiff> = Vec::new();

        for selection in job.selections.clone() {
            let workflow_id = selection.workflow_id.clone();
            if !selection.selected {
                job.skipped.push(WorkflowSkip {
                    workflow_id: workflow_id.clone(),
                    reason: SkipReason::NotSelected,
                });
                self.audit_skip(&job, &workflow_id, "not_selected").await;
                continue;
            }

            // Policy enforcement is fail-closed but non-atomic: a violation
            // fails this workflow only and never triggers rollback
            let violation = if selection.classification == ChangeClassification::TargetAhead
                && !job.policy.allow_hotfix_overwrite
            {
                Some("target was modified more recently than source and the stage does not allow overwriting hotfixes".to_string())
            } else if (selection.classification == ChangeClassification::Conflict
                || selection.requires_overwrite)
                && !job.policy.allow_force_conflicts
            {
                Some("workflow requires overwrite and the stage does not allow force promotion on conflicts".to_string())
            } else {
                None
            };
            if let Some(message) = violation {
                tracing::warn!(job_id = %job.id, %workflow_id, reason = %message, "policy violation");
                job.failed.push(WorkflowFailure {
                    workflow_id: workflow_id.clone(),
                    message: message.clone(),
                });
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::WorkflowPolicyBlocked,
                    Some(job.id),
                    "policy_violation",
                    json!({"workflow_id": workflow_id, "message": message}),
                )
                .await;
                continue;
            }

            let source = match self
                .snapshots
                .workflow_at(&source_snapshot, &workflow_id)
                .await
            {
                Ok(w) => w,
                Err(e) => {
                    return self
                        .hard_failure(job, &pre_snapshot, target.as_ref(), rewrites, workflow_id, e)
                        .await;
                }
            };

            // Idempotency: new workflows scan all target digests so a retry
            // after a crashed attempt cannot create a duplicate; known
            // workflows compare against their counterpart only
            let digest = content_hash(&source.document);
            if selection.classification == ChangeClassification::New {
                if target_digests.contains(&digest) {
                    job.warnings.push(format!(
                        "{} skipped: identical content already present in target",
                        source.name
                    ));
                    job.skipped.push(WorkflowSkip {
                        workflow_id: workflow_id.clone(),
                        reason: SkipReason::AlreadyPresent,
                    });
                    self.audit_skip(&job, &workflow_id, "already_present").await;
                    continue;
                }
            } else if let Some(tgt) = target_by_id.get(&workflow_id) {
                if content_hash(&tgt.document) == digest {
                    job.skipped.push(WorkflowSkip {
                        workflow_id: workflow_id.clone(),
                        reason: SkipReason::Unchanged,
                    });
                    self.audit_skip(&job, &workflow_id, "unchanged").await;
                    continue;
                }
            }

            let RewriteOutcome {
                mut document,
                diffs,
                unmapped,
            } = rewrite_credentials(&workflow_id, &source.document, &lookup);
            if !diffs.is_empty() {
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::CredentialsRewritten,
                    Some(job.id),
                    "success",
                    json!({"workflow_id": workflow_id, "rewrites": diffs}),
                )
                .await;
            }
            rewrites.extend(diffs);

            // A workflow carrying fabricated credentials must never land in
            // a live-firing state
            let needs_placeholders = !unmapped.is_empty();
            if needs_placeholders {
                let keys: Vec<String> = unmapped.iter().map(|k| k.logical_key()).collect();
                job.warnings.push(format!(
                    "{} promoted inactive: placeholder credentials required for {}",
                    source.name,
                    keys.join(", ")
                ));
            }
            if let Some(obj) = document.as_object_mut() {
                let active = if needs_placeholders { false } else { source.active };
                obj.insert("active".into(), Value::Bool(active));
            }

            let write_result = if selection.classification == ChangeClassification::New {
                target.create_workflow(&document).await
            } else {
                match target.update_workflow(&workflow_id, &document).await {
                    // Target lost the workflow out-of-band; recreate it
                    Err(e) if e.is_not_found() => target.create_workflow(&document).await,
                    other => other,
                }
            };

            match write_result {
                Ok(written) => {
                    tracing::info!(
                        job_id = %job.id,
                        %workflow_id,
                        target_id = %written.id,
                        classification = %selection.classification,
                        "workflow promoted"
                    );
                    job.promoted.push(written.id.clone());
                    record_or_log(
                        self.audit.as_ref(),
                        AuditAction::WorkflowPromoted,
                        Some(job.id),
                        "success",
                        json!({
                            "workflow_id": workflow_id,
                            "target_id": written.id,
                            "classification": selection.classification,
                        }),
                    )
                    .await;
                }
                Err(e) => {
                    return self
                        .hard_failure(job, &pre_snapshot, target.as_ref(), rewrites, workflow_id, e)
                        .await;
                }
            }
        }

        self.transition(&mut job, PromotionStatus::Completed).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionCompleted,
            Some(job.id),
            "success",
            json!({
                "promoted": job.promoted.len(),
                "failed": job.failed.len(),
                "skipped": job.skipped.len(),
                "warnings": job.warnings,
            }),
        )
        .await;

        // Post-promotion snapshot is non-fatal: the runtime promotion
        // succeeded, missing metadata can be repaired later
        let post = match target.get_workflows().await {
            Ok(inventory) => {
                self.snapshots
                    .create_snapshot(
                        job.target_environment_id,
                        &inventory,
                        SnapshotType::PostPromotion,
                        job.requested_by.clone(),
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        match post {
            Ok(snapshot) => {
                job.post_snapshot_id = Some(snapshot.id);
                job.touch();
                self.store.put_job(&job).await?;
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::SnapshotCreated,
                    Some(job.id),
                    "success",
                    json!({"snapshot_id": snapshot.id, "snapshot_type": "post_promotion"}),
                )
                .await;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "post-promotion snapshot failed");
                job.warnings
                    .push(format!("post-promotion snapshot failed: {e}"));
                job.touch();
                self.store.put_job(&job).await?;
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::PostSnapshotFailed,
                    Some(job.id),
                    "failure",
                    json!({"error": e.to_string()}),
                )
                .await;
            }
        }

        Ok(ExecutionResult {
            job,
            credential_rewrites: rewrites,
        })
    }

    /// Hard failure inside the loop: roll back everything promoted so far,
    /// fail the job, stop processing.
    async fn hard_failure(
        &self,
        mut job: PromotionJob,
        pre_snapshot: &Snapshot,
        target: &dyn EnvironmentAdapter,
        rewrites: Vec<NodeCredentialDiff>,
        workflow_id: String,
        error: AppError,
    ) -> Result<ExecutionResult> {
        tracing::error!(
            job_id = %job.id,
            %workflow_id,
            error = %error,
            promoted = job.promoted.len(),
            "hard failure in execution loop, rolling back"
        );
        job.failed.push(WorkflowFailure {
            workflow_id: workflow_id.clone(),
            message: error.to_string(),
        });
        job.error = Some(error.to_string());

        record_or_log(
            self.audit.as_ref(),
            AuditAction::RollbackStarted,
            Some(job.id),
            "started",
            json!({"promoted": job.promoted, "snapshot_id": pre_snapshot.id}),
        )
        .await;
        let promoted = job.promoted.clone();
        match self
            .rollback
            .roll_back(job.id, pre_snapshot, &promoted, target)
            .await
        {
            Ok(result) => {
                record_or_log(
                    self.audit.as_ref(),
                    AuditAction::RollbackCompleted,
                    Some(job.id),
                    if result.errors.is_empty() { "success" } else { "partial" },
                    json!({
                        "workflows_rolled_back": result.workflows_rolled_back,
                        "errors": result.errors.len(),
                    }),
                )
                .await;
                job.rollback = Some(result);
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "rollback could not run");
                job.warnings.push(format!("rollback could not run: {e}"));
            }
        }

        self.transition(&mut job, PromotionStatus::Failed).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionFailed,
            Some(job.id),
            "failure",
            json!({"workflow_id": workflow_id, "error": error.to_string()}),
        )
        .await;
        Ok(ExecutionResult {
            job,
            credential_rewrites: rewrites,
        })
    }

    /// Fail a job before any target mutation happened. No rollback runs.
    async fn fail_job(&self, mut job: PromotionJob, message: String) -> Result<ExecutionResult> {
        tracing::error!(job_id = %job.id, error = %message, "promotion failed before execution loop");
        job.error = Some(message.clone());
        self.transition(&mut job, PromotionStatus::Failed).await?;
        record_or_log(
            self.audit.as_ref(),
            AuditAction::PromotionFailed,
            Some(job.id),
            "failure",
            json!({"error": message}),
        )
        .await;
        Ok(ExecutionResult {
            job,
            credential_rewrites: vec![],
        })
    }

    async fn transition(&self, job: &mut PromotionJob, next: PromotionStatus) -> Result<()> {
        if !job.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "job {} cannot move from {} to {next}",
                job.id, job.status
            )));
        }
        tracing::info!(job_id = %job.id, from = %job.status, to = %next, "promotion state change");
        job.status = next;
        job.touch();
        self.store.put_job(job).await
    }

    async fn audit_skip(&self, job: &PromotionJob, workflow_id: &str, reason: &str) {
        record_or_log(
            self.audit.as_ref(),
            AuditAction::WorkflowSkipped,
            Some(job.id),
            reason,
            json!({"workflow_id": workflow_id}),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::memory::{MemoryEnvironment, StaticResolver};
    use crate::error::ProviderErrorKind;
    use crate::models::workflow::WorkflowSelection;
    use crate::services::retry::NoopSleeper;
    use crate::store::memory::MemoryStore;
    use crate::vcs::memory::MemoryVersionStore;
    use crate::vcs::{workflow_path, HEAD};
    use async_trait::async_trait;
    use serde_json::json;

    struct AllowAllDrift;

    #[async_trait]
    impl DriftPolicyService for AllowAllDrift {
        async fn check_enforcement(&self, _: Uuid, _: Uuid, _: Uuid) -> EnforcementOutcome {
            EnforcementOutcome::Allowed
        }
    }

    struct EmptyDirectory;

    #[async_trait]
    impl CredentialDirectory for EmptyDirectory {
        async fn list_mappings(
            &self,
            _: Uuid,
            _: Uuid,
        ) -> Result<Vec<crate::models::credential::CredentialMapping>> {
            Ok(vec![])
        }

        async fn list_logical_credentials(
            &self,
            _: Uuid,
        ) -> Result<Vec<crate::models::credential::LogicalCredential>> {
            Ok(vec![])
        }
    }

    struct NullAudit;

    #[async_trait]
    impl AuditSink for NullAudit {
        async fn record(&self, _: AuditAction, _: Option<Uuid>, _: &str, _: Value) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        service: PromotionService,
        source: Arc<MemoryEnvironment>,
        target: Arc<MemoryEnvironment>,
        vcs: Arc<MemoryVersionStore>,
        source_id: Uuid,
        target_id: Uuid,
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn fixture_with(config: Config) -> Fixture {
        let source = Arc::new(MemoryEnvironment::new());
        let target = Arc::new(MemoryEnvironment::new());
        let source_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        let resolver = Arc::new(
            StaticResolver::new()
                .register(source_id, source.clone())
                .register(target_id, target.clone()),
        );

        let vcs = Arc::new(MemoryVersionStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = PromotionService::new(
            resolver,
            store,
            vcs.clone(),
            Arc::new(AllowAllDrift),
            Arc::new(EmptyDirectory),
            Arc::new(NullAudit),
            Arc::new(NoopSleeper::new()),
            &config,
        );
        Fixture {
            service,
            source,
            target,
            vcs,
            source_id,
            target_id,
        }
    }

    fn workflow(id: &str) -> Workflow {
        Workflow::from_document(json!({
            "id": id,
            "name": format!("Workflow {id}"),
            "active": true,
            "nodes": [{"name": "Step", "type": "core.noOp", "parameters": {}}]
        }))
        .unwrap()
    }

    fn request(fx: &Fixture, ids: &[&str]) -> PromotionRequest {
        PromotionRequest {
            stage_id: "dev-to-staging".into(),
            tenant_id: Uuid::new_v4(),
            source_environment_id: fx.source_id,
            target_environment_id: fx.target_id,
            selections: ids
                .iter()
                .map(|id| WorkflowSelection::candidate(*id, true))
                .collect(),
            conflicted_workflow_ids: vec![],
            requested_by: Some("tester".into()),
        }
    }

    #[tokio::test]
    async fn test_initiate_pins_source_and_classifies() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;

        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap();

        assert_eq!(job.status, PromotionStatus::Pending);
        assert!(job.source_snapshot_id.is_some());
        assert!(job.source_commit.is_some());
        assert_eq!(job.selections[0].classification, ChangeClassification::New);
        assert!(job.gates_passed());
    }

    #[tokio::test]
    async fn test_initiate_rejects_unknown_source_workflow() {
        let fx = fixture();
        let err = fx
            .service
            .initiate(request(&fx, &["wf-missing"]), StagePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_initiate_fails_when_target_inventory_is_unavailable() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;
        fx.target
            .fail_listings(ProviderErrorKind::Server, "503", 1)
            .await;

        let err = fx
            .service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap_err();
        assert!(err.is_transient());

        // Inventory recovered; a fresh initiation classifies normally
        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap();
        assert_eq!(job.selections[0].classification, ChangeClassification::New);
    }

    #[tokio::test]
    async fn test_exports_land_under_the_configured_path_prefix() {
        let config = Config {
            vcs_path_prefix: "archive".into(),
            ..Config::default()
        };
        let fx = fixture_with(config);
        fx.source.insert_workflow(workflow("wf-1")).await;

        fx.service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap();

        let path = workflow_path("archive", fx.source_id, "wf-1");
        assert!(fx.vcs.read_file(&path, HEAD).await.is_ok());
    }

    #[tokio::test]
    async fn test_approval_flow() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;
        let policy = StagePolicy {
            require_approval: true,
            ..Default::default()
        };

        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), policy)
            .await
            .unwrap();
        assert_eq!(job.status, PromotionStatus::PendingApproval);

        // Cannot execute while awaiting approval
        assert!(fx.service.execute(job.id).await.is_err());

        let approved = fx.service.approve(job.id).await.unwrap();
        assert_eq!(approved.status, PromotionStatus::Approved);

        let result = fx.service.execute(job.id).await.unwrap();
        assert_eq!(result.job.status, PromotionStatus::Completed);
    }

    #[tokio::test]
    async fn test_reject_and_cancel_are_terminal() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;
        let policy = StagePolicy {
            require_approval: true,
            ..Default::default()
        };

        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), policy)
            .await
            .unwrap();
        let rejected = fx.service.reject(job.id).await.unwrap();
        assert_eq!(rejected.status, PromotionStatus::Rejected);
        assert!(fx.service.approve(job.id).await.is_err());

        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap();
        let cancelled = fx.service.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.status, PromotionStatus::Cancelled);
        assert!(fx.service.execute(job.id).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_refuses_when_gates_failed() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;
        fx.target.set_unreachable(true).await;

        let job = fx
            .service
            .initiate(request(&fx, &["wf-1"]), StagePolicy::default())
            .await
            .unwrap();
        assert!(!job.gates_passed());
        assert_eq!(job.status, PromotionStatus::Pending);

        let err = fx.service.execute(job.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deselected_workflows_are_skipped() {
        let fx = fixture();
        fx.source.insert_workflow(workflow("wf-1")).await;
        fx.source.insert_workflow(workflow("wf-2")).await;

        let mut req = request(&fx, &["wf-1", "wf-2"]);
        req.selections[1].selected = false;

        let job = fx
            .service
            .initiate(req, StagePolicy::default())
            .await
            .unwrap();
        let result = fx.service.execute(job.id).await.unwrap();

        assert_eq!(result.job.status, PromotionStatus::Completed);
        assert_eq!(result.job.promoted.len(), 1);
        assert_eq!(result.job.skipped.len(), 1);
        assert_eq!(result.job.skipped[0].reason, SkipReason::NotSelected);
        assert!(fx.target.get_workflow("wf-1").await.is_ok());
    }
}
