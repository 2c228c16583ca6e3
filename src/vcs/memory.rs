//! In-memory version store: an append-only commit log where each commit
//! carries the full tree at that point.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};

use super::{VersionStore, HEAD};

#[derive(Debug, Clone)]
struct Commit {
    id: String,
    #[allow(dead_code)]
    message: String,
    tree: BTreeMap<String, String>,
}

/// Append-only in-process commit log.
pub struct MemoryVersionStore {
    commits: RwLock<Vec<Commit>>,
    /// When set, every write fails with this message (for snapshot tests)
    fail_writes: RwLock<Option<String>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self {
            commits: RwLock::new(Vec::new()),
            fail_writes: RwLock::new(None),
        }
    }

    /// Make every subsequent write fail.
    pub async fn fail_writes(&self, message: &str) {
        *self.fail_writes.write().await = Some(message.to_string());
    }

    pub async fn clear_write_failure(&self) {
        *self.fail_writes.write().await = None;
    }

    pub async fn commit_count(&self) -> usize {
        self.commits.read().await.len()
    }
}

impl Default for MemoryVersionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn write_file(&self, path: &str, content: &str, message: &str) -> Result<String> {
        if let Some(msg) = self.fail_writes.read().await.clone() {
            return Err(AppError::VersionStore(msg));
        }

        let mut commits = self.commits.write().await;
        let mut tree = commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        tree.insert(path.to_string(), content.to_string());

        let id = format!("c{:06}", commits.len() + 1);
        commits.push(Commit {
            id: id.clone(),
            message: message.to_string(),
            tree,
        });
        Ok(id)
    }

    async fn read_file(&self, path: &str, reference: &str) -> Result<String> {
        let commits = self.commits.read().await;
        let commit = if reference == HEAD {
            commits.last()
        } else {
            commits.iter().find(|c| c.id == reference)
        }
        .ok_or_else(|| AppError::VersionStore(format!("unknown ref {reference}")))?;

        commit
            .tree
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{path} at {reference}")))
    }

    async fn latest_commit(&self, _branch: &str) -> Result<String> {
        self.commits
            .read()
            .await
            .last()
            .map(|c| c.id.clone())
            .ok_or_else(|| AppError::VersionStore("empty repository".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_are_pinned_to_commits() {
        let store = MemoryVersionStore::new();
        let c1 = store.write_file("a.json", "v1", "first").await.unwrap();
        let c2 = store.write_file("a.json", "v2", "second").await.unwrap();

        assert_eq!(store.read_file("a.json", &c1).await.unwrap(), "v1");
        assert_eq!(store.read_file("a.json", &c2).await.unwrap(), "v2");
        assert_eq!(store.read_file("a.json", HEAD).await.unwrap(), "v2");
        assert_eq!(store.latest_commit("main").await.unwrap(), c2);
    }

    #[tokio::test]
    async fn test_missing_file_at_ref_is_not_found() {
        let store = MemoryVersionStore::new();
        let c1 = store.write_file("a.json", "v1", "first").await.unwrap();
        store.write_file("b.json", "v1", "second").await.unwrap();

        // b.json does not exist yet at c1
        assert!(store
            .read_file("b.json", &c1)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_scripted_write_failure() {
        let store = MemoryVersionStore::new();
        store.fail_writes("disk full").await;
        assert!(store.write_file("a", "x", "m").await.is_err());
        store.clear_write_failure().await;
        assert!(store.write_file("a", "x", "m").await.is_ok());
    }
}
