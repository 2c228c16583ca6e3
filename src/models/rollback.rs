//! Rollback result model: audit evidence of a snapshot restoration attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the target environment was restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMethod {
    /// Per-workflow restore from the pre-promotion snapshot commit
    SnapshotRestore,
}

/// A single workflow that could not be rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackError {
    pub workflow_id: String,
    pub message: String,
}

/// Outcome of a rollback run.
///
/// Always persisted, including partial failures, because the record itself
/// is audit evidence of what state the target was left in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub triggered: bool,
    pub workflows_rolled_back: u32,
    pub errors: Vec<RollbackError>,
    pub snapshot_id: Option<Uuid>,
    pub method: RollbackMethod,
    pub timestamp: DateTime<Utc>,
}

impl RollbackResult {
    /// A result recording that rollback never ran (nothing was promoted).
    pub fn not_triggered() -> Self {
        Self {
            triggered: false,
            workflows_rolled_back: 0,
            errors: vec![],
            snapshot_id: None,
            method: RollbackMethod::SnapshotRestore,
            timestamp: Utc::now(),
        }
    }
}
