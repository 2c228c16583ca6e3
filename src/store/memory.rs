//! In-memory promotion store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::promotion::PromotionJob;
use crate::models::rollback::RollbackResult;
use crate::models::snapshot::Snapshot;

use super::PromotionStore;

/// Map-backed store, safe for concurrent distinct jobs.
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, PromotionJob>>,
    snapshots: RwLock<HashMap<Uuid, Snapshot>>,
    rollbacks: RwLock<HashMap<Uuid, RollbackResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            rollbacks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn put_job(&self, job: &PromotionJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<PromotionJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("promotion job {id}")))
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&snapshot.id) {
            return Err(AppError::Conflict(format!(
                "snapshot {} already persisted",
                snapshot.id
            )));
        }
        snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: Uuid) -> Result<Snapshot> {
        self.snapshots
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("snapshot {id}")))
    }

    async fn put_rollback(&self, job_id: Uuid, result: &RollbackResult) -> Result<()> {
        self.rollbacks.write().await.insert(job_id, result.clone());
        Ok(())
    }

    async fn get_rollback(&self, job_id: Uuid) -> Result<Option<RollbackResult>> {
        Ok(self.rollbacks.read().await.get(&job_id).cloned())
    }
}
