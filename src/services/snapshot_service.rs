//! Snapshot creation and retrieval.
//!
//! A snapshot exports every workflow of an environment to the
//! version-controlled store and records the resulting commit. Creation is
//! all-or-nothing: any export or commit failure aborts the whole operation
//! and no partial snapshot record is persisted.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::snapshot::{Snapshot, SnapshotType, WorkflowSummary};
use crate::models::workflow::Workflow;
use crate::store::PromotionStore;
use crate::vcs::{manifest_path, workflow_path, VersionStore};

pub struct SnapshotService {
    vcs: Arc<dyn VersionStore>,
    store: Arc<dyn PromotionStore>,
    path_prefix: String,
}

impl SnapshotService {
    pub fn new(
        vcs: Arc<dyn VersionStore>,
        store: Arc<dyn PromotionStore>,
        path_prefix: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            store,
            path_prefix: path_prefix.into(),
        }
    }

    /// Export `workflows` as a snapshot of `environment_id`.
    ///
    /// Writes each workflow document, then a manifest file whose commit id
    /// becomes the snapshot's commit. The snapshot record is persisted only
    /// after every write succeeded; an environment with zero workflows still
    /// gets a valid snapshot through the manifest commit.
    pub async fn create_snapshot(
        &self,
        environment_id: Uuid,
        workflows: &[Workflow],
        snapshot_type: SnapshotType,
        created_by: Option<String>,
    ) -> Result<Snapshot> {
        let snapshot_id = Uuid::new_v4();
        let mut summaries = Vec::with_capacity(workflows.len());

        for workflow in workflows {
            let path = workflow_path(&self.path_prefix, environment_id, &workflow.id);
            let content = serde_json::to_string_pretty(&workflow.document)?;
            self.vcs
                .write_file(
                    &path,
                    &content,
                    &format!("{snapshot_type} snapshot of {}", workflow.name),
                )
                .await
                .map_err(|e| {
                    AppError::Snapshot(format!("export of {} failed: {e}", workflow.id))
                })?;

            summaries.push(WorkflowSummary {
                id: workflow.id.clone(),
                name: workflow.name.clone(),
                active: workflow.active,
            });
        }

        // The manifest write produces the commit the snapshot pins to
        let manifest = json!({
            "snapshot_id": snapshot_id,
            "environment_id": environment_id,
            "snapshot_type": snapshot_type,
            "workflows": summaries,
        });
        let commit_id = self
            .vcs
            .write_file(
                &manifest_path(&self.path_prefix, environment_id),
                &serde_json::to_string_pretty(&manifest)?,
                &format!("{snapshot_type} snapshot manifest ({} workflows)", summaries.len()),
            )
            .await
            .map_err(|e| AppError::Snapshot(format!("manifest commit failed: {e}")))?;

        let snapshot = Snapshot {
            id: snapshot_id,
            environment_id,
            commit_id,
            snapshot_type,
            created_at: Utc::now(),
            created_by,
            workflows: summaries,
        };
        self.store.put_snapshot(&snapshot).await?;

        tracing::info!(
            snapshot_id = %snapshot.id,
            environment_id = %environment_id,
            commit = %snapshot.commit_id,
            workflows = snapshot.workflows.len(),
            %snapshot_type,
            "snapshot created"
        );
        Ok(snapshot)
    }

    pub async fn get(&self, id: Uuid) -> Result<Snapshot> {
        self.store.get_snapshot(id).await
    }

    /// Content of one workflow pinned at a snapshot's commit.
    pub async fn workflow_at(&self, snapshot: &Snapshot, workflow_id: &str) -> Result<Workflow> {
        let path = workflow_path(&self.path_prefix, snapshot.environment_id, workflow_id);
        let content = self.vcs.read_file(&path, &snapshot.commit_id).await?;
        Workflow::from_document(serde_json::from_str(&content)?)
    }
}
