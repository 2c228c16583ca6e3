//! Pre-flight gate validation.
//!
//! Runs during promotion initiation, before any job can reach `RUNNING`.
//! Every gate independently returns pass/fail plus a reason; results are
//! attached to the job for approver review and audit.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::environments::EnvironmentAdapter;
use crate::models::credential::CredentialKey;
use crate::models::promotion::{GateKind, GateResult, StagePolicy};
use crate::models::workflow::Workflow;
use crate::ports::{CredentialDirectory, DriftPolicyService, EnforcementOutcome};
use crate::services::credential_rewriter::{collect_credential_keys, CredentialLookup};

/// Everything the gates need to know about one promotion.
pub struct GateContext<'a> {
    pub tenant_id: Uuid,
    pub target_environment_id: Uuid,
    /// Correlation id passed through to the drift-policy service
    pub correlation_id: Uuid,
    pub policy: StagePolicy,
    /// Source versions of the selected workflows, pinned at initiation
    pub selected_sources: &'a [Workflow],
    /// Target inventory fetched at initiation
    pub target_workflows: &'a [Workflow],
    pub target: &'a dyn EnvironmentAdapter,
    pub drift: &'a dyn DriftPolicyService,
    pub credentials: &'a dyn CredentialDirectory,
}

/// Gate validator.
pub struct GateService {
    health_check_timeout: Duration,
}

impl GateService {
    pub fn new(health_check_timeout: Duration) -> Self {
        Self {
            health_check_timeout,
        }
    }

    /// Run all gates. Ordering is fixed for stable audit output.
    pub async fn run_gates(&self, ctx: &GateContext<'_>) -> Vec<GateResult> {
        vec![
            self.target_reachability(ctx).await,
            self.credential_coverage(ctx).await,
            self.drift_policy(ctx).await,
            self.node_compatibility(ctx).await,
            self.webhook_availability(ctx),
        ]
    }

    /// Fail-closed: an unreachable target blocks the promotion.
    async fn target_reachability(&self, ctx: &GateContext<'_>) -> GateResult {
        match timeout(self.health_check_timeout, ctx.target.test_connection()).await {
            Ok(Ok(())) => GateResult::pass(GateKind::TargetReachability),
            Ok(Err(e)) => GateResult::fail(
                GateKind::TargetReachability,
                format!("target environment unreachable: {e}"),
            ),
            Err(_) => GateResult::fail(
                GateKind::TargetReachability,
                format!(
                    "health check timed out after {}s",
                    self.health_check_timeout.as_secs()
                ),
            ),
        }
    }

    /// Every credential referenced by selected workflows needs a mapping for
    /// the target, unless the stage allows placeholders.
    async fn credential_coverage(&self, ctx: &GateContext<'_>) -> GateResult {
        let mut required: Vec<CredentialKey> = Vec::new();
        for workflow in ctx.selected_sources {
            for key in collect_credential_keys(&workflow.document) {
                if !required.contains(&key) {
                    required.push(key);
                }
            }
        }
        if required.is_empty() {
            return GateResult::pass(GateKind::CredentialCoverage);
        }

        let mappings = match ctx
            .credentials
            .list_mappings(ctx.tenant_id, ctx.target_environment_id)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                return GateResult::fail(
                    GateKind::CredentialCoverage,
                    format!("credential directory unavailable: {e}"),
                )
            }
        };

        let lookup = CredentialLookup::new(mappings);
        let missing: Vec<String> = required
            .iter()
            .filter(|key| lookup.resolve(key).is_none())
            .map(|key| key.logical_key())
            .collect();

        if missing.is_empty() {
            GateResult::pass(GateKind::CredentialCoverage)
        } else if ctx.policy.allow_placeholder_credentials {
            GateResult::pass_with_warning(
                GateKind::CredentialCoverage,
                format!(
                    "placeholder credentials will be created for {}; affected workflows are promoted inactive",
                    missing.join(", ")
                ),
            )
        } else {
            GateResult::fail(
                GateKind::CredentialCoverage,
                format!("no target mapping for {}", missing.join(", ")),
            )
        }
    }

    /// Fail-closed on an active drift block, fail-open when the enforcement
    /// check itself errors: a policy-service outage must not globally block
    /// promotions.
    async fn drift_policy(&self, ctx: &GateContext<'_>) -> GateResult {
        match ctx
            .drift
            .check_enforcement(
                ctx.tenant_id,
                ctx.target_environment_id,
                ctx.correlation_id,
            )
            .await
        {
            EnforcementOutcome::Allowed => GateResult::pass(GateKind::DriftPolicy),
            EnforcementOutcome::Blocked { reason } => {
                GateResult::fail(GateKind::DriftPolicy, reason)
            }
            EnforcementOutcome::CheckFailed { error } => {
                tracing::warn!(
                    target_environment = %ctx.target_environment_id,
                    error = %error,
                    "drift enforcement check failed; allowing promotion"
                );
                GateResult::pass_with_warning(
                    GateKind::DriftPolicy,
                    format!("drift enforcement check failed, allowing: {error}"),
                )
            }
        }
    }

    /// The target runtime must support every node type used by the selected
    /// workflows. An empty catalog means support cannot be verified.
    async fn node_compatibility(&self, ctx: &GateContext<'_>) -> GateResult {
        let supported = match ctx.target.list_node_types().await {
            Ok(types) => types,
            Err(e) => {
                return GateResult::fail(
                    GateKind::NodeCompatibility,
                    format!("could not list target node types: {e}"),
                )
            }
        };
        if supported.is_empty() {
            return GateResult::pass_with_warning(
                GateKind::NodeCompatibility,
                "target node catalog unavailable; compatibility not verified",
            );
        }

        let supported_names: HashSet<&str> =
            supported.iter().map(|t| t.name.as_str()).collect();
        let mut missing: Vec<String> = Vec::new();
        for workflow in ctx.selected_sources {
            for node_type in node_types_used(&workflow.document) {
                if !supported_names.contains(node_type.as_str()) && !missing.contains(&node_type) {
                    missing.push(node_type);
                }
            }
        }

        if missing.is_empty() {
            GateResult::pass(GateKind::NodeCompatibility)
        } else {
            GateResult::fail(
                GateKind::NodeCompatibility,
                format!("target runtime does not support {}", missing.join(", ")),
            )
        }
    }

    /// No webhook path used by a selected workflow may collide with a
    /// different workflow already in the target.
    fn webhook_availability(&self, ctx: &GateContext<'_>) -> GateResult {
        let mut conflicts: Vec<String> = Vec::new();
        for workflow in ctx.selected_sources {
            for path in webhook_paths(&workflow.document) {
                for target in ctx.target_workflows {
                    if target.id != workflow.id && webhook_paths(&target.document).contains(&path) {
                        conflicts.push(format!(
                            "{path} ({} vs target {})",
                            workflow.name, target.name
                        ));
                    }
                }
            }
        }

        if conflicts.is_empty() {
            GateResult::pass(GateKind::WebhookAvailability)
        } else {
            GateResult::fail(
                GateKind::WebhookAvailability,
                format!("webhook path conflicts: {}", conflicts.join("; ")),
            )
        }
    }
}

/// Distinct node types used by a workflow document.
fn node_types_used(document: &serde_json::Value) -> Vec<String> {
    let Some(nodes) = document.get("nodes").and_then(|n| n.as_array()) else {
        return vec![];
    };
    let mut types = Vec::new();
    for node in nodes {
        if let Some(t) = node.get("type").and_then(|t| t.as_str()) {
            if !types.iter().any(|x: &String| x == t) {
                types.push(t.to_string());
            }
        }
    }
    types
}

/// Webhook paths registered by a workflow document.
fn webhook_paths(document: &serde_json::Value) -> Vec<String> {
    let Some(nodes) = document.get("nodes").and_then(|n| n.as_array()) else {
        return vec![];
    };
    nodes
        .iter()
        .filter(|node| {
            node.get("type")
                .and_then(|t| t.as_str())
                .map(|t| t.to_ascii_lowercase().contains("webhook"))
                .unwrap_or(false)
        })
        .filter_map(|node| {
            node.get("parameters")
                .and_then(|p| p.get("path"))
                .and_then(|p| p.as_str())
                .map(|p| p.to_string())
        })
        .collect()
}
