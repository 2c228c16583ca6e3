//! Shared test harness: a fully wired promotion engine over in-memory
//! environments, stores, and collaborators.
#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use flowgate::environments::memory::{MemoryEnvironment, StaticResolver};
use flowgate::models::credential::{CredentialMapping, LogicalCredential};
use flowgate::ports::{CredentialDirectory, DriftPolicyService, EnforcementOutcome};
use flowgate::services::audit_service::{AuditAction, AuditSink};
use flowgate::services::promotion_service::PromotionService;
use flowgate::services::retry::NoopSleeper;
use flowgate::store::memory::MemoryStore;
use flowgate::vcs::memory::MemoryVersionStore;
use flowgate::Config;

/// Drift-policy double whose outcome can be swapped mid-test.
pub struct MutableDrift {
    outcome: tokio::sync::RwLock<EnforcementOutcome>,
}

impl MutableDrift {
    pub fn allowed() -> Self {
        Self {
            outcome: tokio::sync::RwLock::new(EnforcementOutcome::Allowed),
        }
    }

    pub async fn set(&self, outcome: EnforcementOutcome) {
        *self.outcome.write().await = outcome;
    }
}

#[async_trait]
impl DriftPolicyService for MutableDrift {
    async fn check_enforcement(&self, _: Uuid, _: Uuid, _: Uuid) -> EnforcementOutcome {
        self.outcome.read().await.clone()
    }
}

/// Credential directory double backed by a fixed mapping list.
pub struct StaticDirectory {
    mappings: Vec<CredentialMapping>,
}

impl StaticDirectory {
    pub fn new(mappings: Vec<CredentialMapping>) -> Self {
        Self { mappings }
    }
}

#[async_trait]
impl CredentialDirectory for StaticDirectory {
    async fn list_mappings(&self, _: Uuid, _: Uuid) -> flowgate::Result<Vec<CredentialMapping>> {
        Ok(self.mappings.clone())
    }

    async fn list_logical_credentials(&self, _: Uuid) -> flowgate::Result<Vec<LogicalCredential>> {
        Ok(vec![])
    }
}

/// Audit sink that records every action for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    records: tokio::sync::Mutex<Vec<(AuditAction, String)>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn actions(&self) -> Vec<AuditAction> {
        self.records.lock().await.iter().map(|(a, _)| *a).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(
        &self,
        action: AuditAction,
        _resource_id: Option<Uuid>,
        result: &str,
        _metadata: serde_json::Value,
    ) -> flowgate::Result<()> {
        self.records.lock().await.push((action, result.to_string()));
        Ok(())
    }
}

pub struct EngineFixture {
    pub service: PromotionService,
    pub source: Arc<MemoryEnvironment>,
    pub target: Arc<MemoryEnvironment>,
    pub vcs: Arc<MemoryVersionStore>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<RecordingAuditSink>,
    pub drift: Arc<MutableDrift>,
    pub source_id: Uuid,
    pub target_id: Uuid,
}

pub fn engine() -> EngineFixture {
    engine_with(vec![], Config::default())
}

pub fn engine_with_mappings(mappings: Vec<CredentialMapping>) -> EngineFixture {
    engine_with(mappings, Config::default())
}

pub fn engine_with_config(config: Config) -> EngineFixture {
    engine_with(vec![], config)
}

fn engine_with(mappings: Vec<CredentialMapping>, config: Config) -> EngineFixture {
    let source = Arc::new(MemoryEnvironment::new());
    let target = Arc::new(MemoryEnvironment::new());
    let source_id = Uuid::new_v4();
    let target_id = Uuid::new_v4();
    let resolver = Arc::new(
        StaticResolver::new()
            .register(source_id, source.clone())
            .register(target_id, target.clone()),
    );

    let vcs = Arc::new(MemoryVersionStore::new());
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let drift = Arc::new(MutableDrift::allowed());

    let service = PromotionService::new(
        resolver,
        store.clone(),
        vcs.clone(),
        drift.clone(),
        Arc::new(StaticDirectory::new(mappings)),
        audit.clone(),
        Arc::new(NoopSleeper::new()),
        &config,
    );

    EngineFixture {
        service,
        source,
        target,
        vcs,
        store,
        audit,
        drift,
        source_id,
        target_id,
    }
}
