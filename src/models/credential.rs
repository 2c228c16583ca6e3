//! Credential models: logical references inside workflow documents and the
//! per-environment mapping to physical credentials.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment-independent reference to "a credential of this kind".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub credential_type: String,
    pub name: String,
}

impl CredentialKey {
    pub fn new(credential_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            credential_type: credential_type.into(),
            name: name.into(),
        }
    }

    /// Lookup key used by the mapping table: `{type}:{name}`.
    pub fn logical_key(&self) -> String {
        format!("{}:{}", self.credential_type, self.name)
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.logical_key())
    }
}

/// Mapping from a logical credential to the physical credential of one
/// target environment. Owned by the credential-administration subsystem;
/// read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialMapping {
    pub logical_type: String,
    pub logical_name: String,
    pub target_environment_id: Uuid,
    pub physical_id: String,
    pub physical_name: String,
    pub physical_type: String,
}

impl CredentialMapping {
    pub fn logical_key(&self) -> String {
        format!("{}:{}", self.logical_type, self.logical_name)
    }
}

/// A named logical credential registered for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalCredential {
    pub credential_type: String,
    pub name: String,
    pub description: Option<String>,
}
