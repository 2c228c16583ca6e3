//! Version-controlled store.
//!
//! Environment exports live in a version-controlled repository; snapshots
//! reference commits in it and rollback reads workflow content pinned at the
//! pre-promotion commit.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

/// Ref name that resolves to the branch head.
pub const HEAD: &str = "HEAD";

use crate::error::Result;

/// Contract with the version-controlled repository.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Write (create or replace) a file, returning the resulting commit id.
    async fn write_file(&self, path: &str, content: &str, message: &str) -> Result<String>;

    /// Read a file pinned at a commit id, or at the branch head when
    /// `reference` is [`HEAD`]. `AppError::NotFound` when the file does not
    /// exist at that ref.
    async fn read_file(&self, path: &str, reference: &str) -> Result<String>;

    /// Latest commit id on the branch.
    async fn latest_commit(&self, branch: &str) -> Result<String>;
}

/// Conventional path of one workflow export.
pub fn workflow_path(prefix: &str, environment_id: Uuid, workflow_id: &str) -> String {
    format!("{prefix}/{environment_id}/workflows/{workflow_id}.json")
}

/// Conventional path of an environment's snapshot manifest.
pub fn manifest_path(prefix: &str, environment_id: Uuid) -> String {
    format!("{prefix}/{environment_id}/manifest.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_paths() {
        let env = Uuid::nil();
        assert_eq!(
            workflow_path("environments", env, "wf-1"),
            format!("environments/{env}/workflows/wf-1.json")
        );
        assert_eq!(
            manifest_path("environments", env),
            format!("environments/{env}/manifest.json")
        );
    }
}
