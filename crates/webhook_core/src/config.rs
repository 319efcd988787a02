//! Engine configuration
//!
//! Every field has a default so an empty TOML table is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delivery::DEFAULT_MAX_RESPONSE_BODY_CHARS;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub delivery: DeliveryConfig,
    pub scheduler: SchedulerConfig,
    pub registry: RegistryConfig,
}

/// Outbound HTTP and worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_response_body_chars: usize,
    /// Added to the request timeout to form the claim lease.
    pub claim_grace_secs: u64,
}

impl DeliveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// How long an execution owns a claimed record before another caller
    /// may take it over.
    pub fn claim_lease(&self) -> chrono::Duration {
        let secs = self
            .request_timeout_secs
            .saturating_add(self.claim_grace_secs);
        chrono::Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX))
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            request_timeout_secs: 30,
            user_agent: format!("webhook-engine/{}", env!("CARGO_PKG_VERSION")),
            max_response_body_chars: DEFAULT_MAX_RESPONSE_BODY_CHARS,
            claim_grace_secs: 60,
        }
    }
}

/// Retry sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub batch_limit: usize,
    /// Executions in flight per sweep.
    pub concurrency: usize,
    /// Age after which a `pending` delivery is considered orphaned.
    pub orphan_grace_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            batch_limit: 100,
            concurrency: 8,
            orphan_grace_secs: 60,
        }
    }
}

/// Registration rules and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub require_https: bool,
    pub default_max_retries: u32,
    pub default_retry_delay_secs: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            require_https: false,
            default_max_retries: 3,
            default_retry_delay_secs: 60,
        }
    }
}
