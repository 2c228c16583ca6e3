//! Durable engine state.
//!
//! `PromotionJob`, `Snapshot`, and `RollbackResult` must survive process
//! restart: recovering a crashed mid-promotion job depends on reading the
//! pre-promotion snapshot id back from storage. Core logic depends only on
//! this trait, never on a concrete backend.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::promotion::PromotionJob;
use crate::models::rollback::RollbackResult;
use crate::models::snapshot::Snapshot;

/// Persistence contract for promotion state.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Insert or replace a job record.
    async fn put_job(&self, job: &PromotionJob) -> Result<()>;

    /// Load a job; `AppError::NotFound` when absent.
    async fn get_job(&self, id: Uuid) -> Result<PromotionJob>;

    /// Persist a completed snapshot record. Snapshots are immutable;
    /// replacing an existing id is a conflict.
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load a snapshot; `AppError::NotFound` when absent.
    async fn get_snapshot(&self, id: Uuid) -> Result<Snapshot>;

    /// Persist rollback evidence for a job.
    async fn put_rollback(&self, job_id: Uuid, result: &RollbackResult) -> Result<()>;

    /// Load rollback evidence for a job, if any.
    async fn get_rollback(&self, job_id: Uuid) -> Result<Option<RollbackResult>>;
}
