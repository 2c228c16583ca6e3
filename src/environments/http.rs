//! HTTP environment adapter.
//!
//! Talks to a runtime environment's REST control API. Non-2xx responses are
//! mapped onto the provider error taxonomy so callers can distinguish
//! not-found (create fallback) from transient failures (retry) from hard
//! rejections.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::error::{AppError, ProviderErrorKind, Result};
use crate::models::workflow::Workflow;

use super::{EnvironmentAdapter, NodeType};

/// Authentication method for an environment's control API.
#[derive(Debug, Clone)]
pub enum EnvironmentAuth {
    ApiToken(String),
    BasicAuth { username: String, password: String },
}

/// HTTP adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpEnvironmentConfig {
    /// Base URL of the environment's control API
    pub base_url: String,
    pub auth: EnvironmentAuth,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// REST-backed environment adapter.
pub struct HttpEnvironment {
    client: Client,
    config: HttpEnvironmentConfig,
}

impl HttpEnvironment {
    pub fn new(config: HttpEnvironmentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            EnvironmentAuth::ApiToken(token) => builder.header("X-API-KEY", token),
            EnvironmentAuth::BasicAuth { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn check(&self, response: Response, resource: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound(resource.to_string()),
            StatusCode::TOO_MANY_REQUESTS => AppError::provider(
                ProviderErrorKind::RateLimited,
                format!("{resource}: {message}"),
            ),
            s if s.is_server_error() => AppError::provider(
                ProviderErrorKind::Server,
                format!("{resource}: {s} {message}"),
            ),
            s => AppError::provider(
                ProviderErrorKind::BadRequest,
                format!("{resource}: {s} {message}"),
            ),
        })
    }

    /// Map transport-level failures onto the provider taxonomy.
    fn transport_error(e: reqwest::Error, resource: &str) -> AppError {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else if e.is_connect() {
            ProviderErrorKind::Network
        } else {
            return AppError::Http(e);
        };
        AppError::provider(kind, format!("{resource}: {e}"))
    }
}

#[async_trait]
impl EnvironmentAdapter for HttpEnvironment {
    async fn test_connection(&self) -> Result<()> {
        let response = self
            .authed(self.client.get(self.url("healthz")))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "healthz"))?;
        self.check(response, "healthz").await?;
        Ok(())
    }

    async fn get_workflows(&self) -> Result<Vec<Workflow>> {
        let response = self
            .authed(self.client.get(self.url("workflows")))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "workflows"))?;
        let documents: Vec<serde_json::Value> =
            self.check(response, "workflows").await?.json().await?;
        documents.into_iter().map(Workflow::from_document).collect()
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let resource = format!("workflows/{id}");
        let response = self
            .authed(self.client.get(self.url(&resource)))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, &resource))?;
        let document: serde_json::Value = self.check(response, &resource).await?.json().await?;
        Workflow::from_document(document)
    }

    async fn create_workflow(&self, document: &serde_json::Value) -> Result<Workflow> {
        let response = self
            .authed(self.client.post(self.url("workflows")).json(document))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "workflows"))?;
        let created: serde_json::Value = self.check(response, "workflows").await?.json().await?;
        Workflow::from_document(created)
    }

    async fn update_workflow(&self, id: &str, document: &serde_json::Value) -> Result<Workflow> {
        let resource = format!("workflows/{id}");
        let response = self
            .authed(self.client.put(self.url(&resource)).json(document))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, &resource))?;
        let updated: serde_json::Value = self.check(response, &resource).await?.json().await?;
        Workflow::from_document(updated)
    }

    async fn list_node_types(&self) -> Result<Vec<NodeType>> {
        let response = self
            .authed(self.client.get(self.url("node-types")))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "node-types"))?;
        let types: Vec<NodeType> = self.check(response, "node-types").await?.json().await?;
        Ok(types)
    }
}
