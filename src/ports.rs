//! External collaborator contracts consumed through narrow interfaces:
//! drift-policy enforcement and the credential directory.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::credential::{CredentialMapping, LogicalCredential};

/// Outcome of a drift-policy enforcement check.
///
/// `CheckFailed` is deliberately distinct from `Blocked`: the executor treats
/// it as allowed-with-warning (fail-open), because an outage of the policy
/// service must not globally block promotions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementOutcome {
    Allowed,
    Blocked { reason: String },
    CheckFailed { error: String },
}

/// Drift-policy enforcement service.
#[async_trait]
pub trait DriftPolicyService: Send + Sync {
    async fn check_enforcement(
        &self,
        tenant_id: Uuid,
        environment_id: Uuid,
        correlation_id: Uuid,
    ) -> EnforcementOutcome;
}

/// Read-only credential-mapping directory, owned by the
/// credential-administration subsystem.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Mappings resolving logical credentials for one target environment.
    async fn list_mappings(
        &self,
        tenant_id: Uuid,
        environment_id: Uuid,
    ) -> Result<Vec<CredentialMapping>>;

    /// All logical credentials registered for a tenant.
    async fn list_logical_credentials(&self, tenant_id: Uuid) -> Result<Vec<LogicalCredential>>;
}
