//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// HTTP transport settings.
    pub http: HttpSettings,
    /// Background and delivery scheduling.
    pub scheduler: SchedulerSettings,
    /// Configuration cache.
    pub cache: CacheSettings,
    /// Gateway endpoint and credentials.
    pub gateway: GatewaySettings,
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Base URL for relative request paths.
    pub base_url: Option<String>,
    /// Connection timeout (seconds).
    pub connect_timeout_secs: u64,
    /// Whole-request timeout (seconds).
    pub request_timeout_secs: u64,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// Accept gzip-encoded responses.
    pub gzip: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: None,
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Background worker threads.
    pub worker_threads: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { worker_threads: 4 }
    }
}

/// Configuration cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entry time-to-live (seconds).
    pub ttl_secs: u64,
    /// Persist the cache to this file instead of keeping it in memory.
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            path: None,
        }
    }
}

/// Gateway endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// URL the configuration document is fetched from.
    pub config_url: Option<String>,
    /// Authorization token sent with every request.
    pub authorization: Option<String>,
}
