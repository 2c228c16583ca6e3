//! Rollback: restore promoted workflows from the pre-promotion snapshot.
//!
//! Runs when a hard failure aborts the execution loop. Restoration is
//! best-effort per workflow: each promoted workflow is restored
//! independently and individual failures are recorded rather than aborting
//! the remaining restores. The result is always persisted, partial or not,
//! because it is the audit evidence of what state the target was left in.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::environments::EnvironmentAdapter;
use crate::models::rollback::{RollbackError, RollbackMethod, RollbackResult};
use crate::models::snapshot::Snapshot;
use crate::models::workflow::Workflow;
use crate::services::retry::{with_retry, RetryConfig, Sleeper};
use crate::services::snapshot_service::SnapshotService;
use crate::store::PromotionStore;

pub struct RollbackService {
    snapshots: Arc<SnapshotService>,
    store: Arc<dyn PromotionStore>,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RollbackService {
    pub fn new(
        snapshots: Arc<SnapshotService>,
        store: Arc<dyn PromotionStore>,
        retry: RetryConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            snapshots,
            store,
            retry,
            sleeper,
        }
    }

    /// Restore `promoted_ids` in the target from the pre-promotion snapshot.
    ///
    /// Workflows that were newly created by the promotion have no entry in
    /// the snapshot; they are recorded as rollback errors since the engine
    /// never deletes from a target environment.
    pub async fn roll_back(
        &self,
        job_id: Uuid,
        snapshot: &Snapshot,
        promoted_ids: &[String],
        target: &dyn EnvironmentAdapter,
    ) -> Result<RollbackResult> {
        if !snapshot.restorable() {
            return Err(AppError::Snapshot(format!(
                "snapshot {} has no commit and cannot be restored",
                snapshot.id
            )));
        }

        tracing::warn!(
            job_id = %job_id,
            snapshot_id = %snapshot.id,
            workflows = promoted_ids.len(),
            "rolling back promoted workflows"
        );

        let mut rolled_back = 0u32;
        let mut errors = Vec::new();

        for workflow_id in promoted_ids {
            match self.restore_one(snapshot, workflow_id, target).await {
                Ok(()) => rolled_back += 1,
                Err(e) => {
                    tracing::error!(
                        job_id = %job_id,
                        %workflow_id,
                        error = %e,
                        "workflow could not be rolled back"
                    );
                    errors.push(RollbackError {
                        workflow_id: workflow_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let result = RollbackResult {
            triggered: true,
            workflows_rolled_back: rolled_back,
            errors,
            snapshot_id: Some(snapshot.id),
            method: RollbackMethod::SnapshotRestore,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.put_rollback(job_id, &result).await {
            // The in-memory result still reaches the job record
            tracing::error!(job_id = %job_id, error = %e, "failed to persist rollback result");
        }
        Ok(result)
    }

    async fn restore_one(
        &self,
        snapshot: &Snapshot,
        workflow_id: &str,
        target: &dyn EnvironmentAdapter,
    ) -> Result<()> {
        let pinned: Workflow = match self.snapshots.workflow_at(snapshot, workflow_id).await {
            Ok(w) => w,
            Err(e) if e.is_not_found() => {
                return Err(AppError::Snapshot(format!(
                    "{workflow_id} is not in the pre-promotion snapshot; it was created by the promotion and must be removed manually"
                )));
            }
            Err(e) => return Err(e),
        };

        let write = with_retry(&self.retry, self.sleeper.as_ref(), || async {
            target.update_workflow(workflow_id, &pinned.document).await
        })
        .await;

        match write {
            Ok(_) => Ok(()),
            // Deleted out from under us mid-rollback; recreate it
            Err(e) if e.is_not_found() => {
                with_retry(&self.retry, self.sleeper.as_ref(), || async {
                    target.create_workflow(&pinned.document).await
                })
                .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
