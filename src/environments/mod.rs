//! Environment adapters.
//!
//! Each runtime environment is reached through an `EnvironmentAdapter`; the
//! engine depends only on the trait, never on a concrete provider type.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::workflow::Workflow;

/// A node type supported by an environment's runtime.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeType {
    pub name: String,
    pub version: i64,
}

/// Control-API surface of one runtime environment.
#[async_trait]
pub trait EnvironmentAdapter: Send + Sync {
    /// Cheap connectivity probe. Callers bound it with their own timeout.
    async fn test_connection(&self) -> Result<()>;

    /// Full workflow inventory of the environment.
    async fn get_workflows(&self) -> Result<Vec<Workflow>>;

    /// A single workflow; `AppError::NotFound` when absent.
    async fn get_workflow(&self, id: &str) -> Result<Workflow>;

    /// Create a workflow from a document; the provider assigns the id.
    async fn create_workflow(&self, document: &serde_json::Value) -> Result<Workflow>;

    /// Update an existing workflow; `AppError::NotFound` when absent.
    async fn update_workflow(&self, id: &str, document: &serde_json::Value) -> Result<Workflow>;

    /// Node types the runtime supports. An empty list means the catalog is
    /// unavailable, which the compatibility gate treats as unverifiable
    /// rather than failing.
    async fn list_node_types(&self) -> Result<Vec<NodeType>>;
}

/// Resolves an environment id to the adapter for its provider family.
#[async_trait]
pub trait EnvironmentResolver: Send + Sync {
    async fn adapter_for(&self, environment_id: Uuid) -> Result<Arc<dyn EnvironmentAdapter>>;
}
