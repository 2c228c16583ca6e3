//! Application configuration loaded from environment variables.

use std::env;

use crate::error::Result;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: String,

    /// Path prefix for environment exports in the version-controlled store
    pub vcs_path_prefix: String,

    /// Timeout for the target-reachability health check in seconds
    pub health_check_timeout_secs: u64,

    /// Maximum retries after the first attempt when restoring a workflow
    pub rollback_max_retries: u32,

    /// Initial delay in milliseconds before the first rollback retry
    pub rollback_initial_delay_ms: u64,

    /// Upper bound on the rollback retry delay in milliseconds
    pub rollback_max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            vcs_path_prefix: "environments".into(),
            health_check_timeout_secs: 5,
            rollback_max_retries: 3,
            rollback_initial_delay_ms: 250,
            rollback_max_delay_ms: 30_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            vcs_path_prefix: env::var("VCS_PATH_PREFIX").unwrap_or(defaults.vcs_path_prefix),
            health_check_timeout_secs: env::var("HEALTH_CHECK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.health_check_timeout_secs),
            rollback_max_retries: env::var("ROLLBACK_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rollback_max_retries),
            rollback_initial_delay_ms: env::var("ROLLBACK_INITIAL_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rollback_initial_delay_ms),
            rollback_max_delay_ms: env::var("ROLLBACK_MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rollback_max_delay_ms),
        })
    }
}
