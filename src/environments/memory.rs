//! In-memory environment adapter.
//!
//! Backs unit and integration tests, and doubles as a scratch environment
//! for local tooling. Supports scripted per-workflow write failures so the
//! atomicity and retry behavior of the engine can be exercised without a
//! real provider.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{AppError, ProviderErrorKind, Result};
use crate::models::workflow::Workflow;

use super::{EnvironmentAdapter, NodeType};

/// Scripted failure for writes touching one workflow name.
#[derive(Debug, Clone)]
struct FailureScript {
    kind: ProviderErrorKind,
    message: String,
    /// How many more writes fail before the script is exhausted
    remaining: u32,
}

/// A write applied to the environment, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Created(String),
    Updated(String),
}

/// In-process environment with a map of workflows keyed by id.
pub struct MemoryEnvironment {
    workflows: RwLock<BTreeMap<String, Workflow>>,
    node_types: RwLock<Vec<NodeType>>,
    unreachable: RwLock<bool>,
    list_failures: RwLock<Option<FailureScript>>,
    write_failures: RwLock<HashMap<String, FailureScript>>,
    write_log: RwLock<Vec<WriteOp>>,
    next_id: AtomicU64,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(BTreeMap::new()),
            node_types: RwLock::new(Vec::new()),
            unreachable: RwLock::new(false),
            list_failures: RwLock::new(None),
            write_failures: RwLock::new(HashMap::new()),
            write_log: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed a workflow, keeping whatever id its document carries.
    pub async fn insert_workflow(&self, workflow: Workflow) {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
    }

    pub async fn set_node_types(&self, types: Vec<NodeType>) {
        *self.node_types.write().await = types;
    }

    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    /// Fail the next `times` workflow listings while the environment stays
    /// otherwise healthy.
    pub async fn fail_listings(&self, kind: ProviderErrorKind, message: &str, times: u32) {
        *self.list_failures.write().await = Some(FailureScript {
            kind,
            message: message.to_string(),
            remaining: times,
        });
    }

    /// Fail the next `times` writes that touch a workflow with this name.
    pub async fn fail_writes(
        &self,
        workflow_name: &str,
        kind: ProviderErrorKind,
        message: &str,
        times: u32,
    ) {
        self.write_failures.write().await.insert(
            workflow_name.to_string(),
            FailureScript {
                kind,
                message: message.to_string(),
                remaining: times,
            },
        );
    }

    /// Writes applied so far, in order.
    pub async fn writes(&self) -> Vec<WriteOp> {
        self.write_log.read().await.clone()
    }

    async fn check_reachable(&self) -> Result<()> {
        if *self.unreachable.read().await {
            return Err(AppError::provider(
                ProviderErrorKind::Network,
                "environment unreachable",
            ));
        }
        Ok(())
    }

    /// Consume one scripted failure for this workflow name, if any remain.
    async fn consume_failure(&self, name: &str) -> Result<()> {
        let mut failures = self.write_failures.write().await;
        if let Some(script) = failures.get_mut(name) {
            if script.remaining > 0 {
                script.remaining -= 1;
                return Err(AppError::provider(script.kind, script.message.clone()));
            }
            failures.remove(name);
        }
        Ok(())
    }

    fn document_name(document: &serde_json::Value) -> String {
        document
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("unnamed")
            .to_string()
    }
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed id-to-adapter table, for tests and local tooling.
pub struct StaticResolver {
    environments: HashMap<uuid::Uuid, std::sync::Arc<MemoryEnvironment>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self {
            environments: HashMap::new(),
        }
    }

    pub fn register(
        mut self,
        environment_id: uuid::Uuid,
        environment: std::sync::Arc<MemoryEnvironment>,
    ) -> Self {
        self.environments.insert(environment_id, environment);
        self
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::EnvironmentResolver for StaticResolver {
    async fn adapter_for(
        &self,
        environment_id: uuid::Uuid,
    ) -> Result<std::sync::Arc<dyn EnvironmentAdapter>> {
        self.environments
            .get(&environment_id)
            .cloned()
            .map(|e| e as std::sync::Arc<dyn EnvironmentAdapter>)
            .ok_or_else(|| AppError::NotFound(format!("environment {environment_id}")))
    }
}

#[async_trait]
impl EnvironmentAdapter for MemoryEnvironment {
    async fn test_connection(&self) -> Result<()> {
        self.check_reachable().await
    }

    async fn get_workflows(&self) -> Result<Vec<Workflow>> {
        self.check_reachable().await?;
        let mut script = self.list_failures.write().await;
        if let Some(s) = script.as_mut() {
            if s.remaining > 0 {
                s.remaining -= 1;
                return Err(AppError::provider(s.kind, s.message.clone()));
            }
            *script = None;
        }
        Ok(self.workflows.read().await.values().cloned().collect())
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        self.check_reachable().await?;
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("workflow {id}")))
    }

    async fn create_workflow(&self, document: &serde_json::Value) -> Result<Workflow> {
        self.check_reachable().await?;
        let name = Self::document_name(document);
        self.consume_failure(&name).await?;

        let mut document = document.clone();
        let id = match document.get("id").and_then(|v| v.as_str()) {
            Some(existing) if !self.workflows.read().await.contains_key(existing) => {
                existing.to_string()
            }
            _ => format!("wf-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        if let Some(obj) = document.as_object_mut() {
            obj.insert("id".into(), serde_json::Value::String(id.clone()));
        }

        let mut workflow = Workflow::from_document(document)?;
        workflow.updated_at = Utc::now();
        self.workflows
            .write()
            .await
            .insert(id.clone(), workflow.clone());
        self.write_log.write().await.push(WriteOp::Created(id));
        Ok(workflow)
    }

    async fn update_workflow(&self, id: &str, document: &serde_json::Value) -> Result<Workflow> {
        self.check_reachable().await?;
        let name = Self::document_name(document);
        self.consume_failure(&name).await?;

        let mut workflows = self.workflows.write().await;
        if !workflows.contains_key(id) {
            return Err(AppError::NotFound(format!("workflow {id}")));
        }

        let mut document = document.clone();
        if let Some(obj) = document.as_object_mut() {
            obj.insert("id".into(), serde_json::Value::String(id.to_string()));
        }
        let mut workflow = Workflow::from_document(document)?;
        workflow.updated_at = Utc::now();
        workflows.insert(id.to_string(), workflow.clone());
        self.write_log
            .write()
            .await
            .push(WriteOp::Updated(id.to_string()));
        Ok(workflow)
    }

    async fn list_node_types(&self) -> Result<Vec<NodeType>> {
        self.check_reachable().await?;
        Ok(self.node_types.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_id_and_logs_write() {
        let env = MemoryEnvironment::new();
        let created = env
            .create_workflow(&json!({"name": "Sync", "active": true}))
            .await
            .unwrap();
        assert!(created.id.starts_with("wf-"));
        assert!(created.active);
        assert_eq!(env.writes().await, vec![WriteOp::Created(created.id.clone())]);
    }

    #[tokio::test]
    async fn test_create_keeps_unused_document_id() {
        let env = MemoryEnvironment::new();
        let created = env
            .create_workflow(&json!({"id": "wf-orig", "name": "Sync"}))
            .await
            .unwrap();
        assert_eq!(created.id, "wf-orig");
    }

    #[tokio::test]
    async fn test_update_missing_workflow_is_not_found() {
        let env = MemoryEnvironment::new();
        let err = env
            .update_workflow("wf-9", &json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let env = MemoryEnvironment::new();
        env.fail_writes("Sync", ProviderErrorKind::Server, "503", 2)
            .await;

        let doc = json!({"name": "Sync"});
        assert!(env.create_workflow(&doc).await.unwrap_err().is_transient());
        assert!(env.create_workflow(&doc).await.unwrap_err().is_transient());
        // Script exhausted; third write lands
        assert!(env.create_workflow(&doc).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_listing_failures_leave_the_rest_healthy() {
        let env = MemoryEnvironment::new();
        env.fail_listings(ProviderErrorKind::Server, "503", 1).await;

        assert!(env.test_connection().await.is_ok());
        assert!(env.get_workflows().await.unwrap_err().is_transient());
        assert!(env.get_workflows().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_blocks_everything() {
        let env = MemoryEnvironment::new();
        env.set_unreachable(true).await;
        assert!(env.test_connection().await.is_err());
        assert!(env.get_workflows().await.is_err());
    }
}
