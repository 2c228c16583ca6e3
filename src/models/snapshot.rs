//! Snapshot model: a point-in-time, content-addressed export of an
//! environment's workflows, referenced by a version-control commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    PrePromotion,
    PostPromotion,
    AutoBackup,
    ManualBackup,
}

impl std::fmt::Display for SnapshotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SnapshotType::PrePromotion => "pre_promotion",
            SnapshotType::PostPromotion => "post_promotion",
            SnapshotType::AutoBackup => "auto_backup",
            SnapshotType::ManualBackup => "manual_backup",
        };
        write!(f, "{s}")
    }
}

/// Summary of one captured workflow in a snapshot manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// Immutable record of a completed environment export.
///
/// A snapshot is valid for restoration only if every workflow was exported,
/// committed, and the commit identifier persisted. Partial snapshots are
/// never stored; the creating operation fails outright instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub environment_id: Uuid,
    /// Commit in the version-controlled store containing the full export
    pub commit_id: String,
    pub snapshot_type: SnapshotType,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    /// Manifest of captured workflows
    pub workflows: Vec<WorkflowSummary>,
}

impl Snapshot {
    /// Whether this snapshot can be used for restoration.
    pub fn restorable(&self) -> bool {
        !self.commit_id.is_empty()
    }
}
