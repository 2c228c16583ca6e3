//! Application error types and result alias.

use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Classification of a provider-side failure, used to decide whether an
/// operation may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Request exceeded its deadline
    Timeout,
    /// Provider returned 429
    RateLimited,
    /// Connection-level failure (DNS, refused, reset)
    Network,
    /// Provider returned 5xx
    Server,
    /// Non-retryable 4xx other than not-found
    BadRequest,
}

impl ProviderErrorKind {
    /// Transient failures are safe to retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Timeout
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::Network
                | ProviderErrorKind::Server
        )
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict error (e.g., invalid state transition)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error (gate failures, bad input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Policy violation for a single workflow
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Snapshot operation failed; no partial snapshot was persisted
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Version-controlled store error
    #[error("Version store error: {0}")]
    VersionStore(String),

    /// Provider-side failure from an environment's control API
    #[error("Provider error ({kind:?}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        AppError::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Whether this error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Provider { kind, .. } => kind.is_transient(),
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether this error means the addressed resource does not exist on the
    /// provider, which write paths handle with a create fallback.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::provider(ProviderErrorKind::Timeout, "t").is_transient());
        assert!(AppError::provider(ProviderErrorKind::RateLimited, "r").is_transient());
        assert!(AppError::provider(ProviderErrorKind::Network, "n").is_transient());
        assert!(AppError::provider(ProviderErrorKind::Server, "s").is_transient());
        assert!(!AppError::provider(ProviderErrorKind::BadRequest, "b").is_transient());
    }

    #[test]
    fn test_non_provider_errors_are_not_transient() {
        assert!(!AppError::NotFound("x".into()).is_transient());
        assert!(!AppError::Validation("x".into()).is_transient());
        assert!(!AppError::PolicyViolation("x".into()).is_transient());
        assert!(!AppError::Internal("x".into()).is_transient());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(AppError::NotFound("wf-1".into()).is_not_found());
        assert!(!AppError::provider(ProviderErrorKind::BadRequest, "400").is_not_found());
    }
}
