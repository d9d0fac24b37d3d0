//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Upstream application server.
    pub upstream: UpstreamConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub session: SessionConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds. Must exceed `upstream.timeout_ms`
    /// so a stalled forward answers 502 before the listener gives up.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Upstream application server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Start the bridge at all.
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    /// Context path the upstream application is mounted under ("" for root).
    pub context_path: String,

    /// Absolute upstream path probed for health.
    pub health_path: String,

    /// Absolute upstream path serving the route metadata document.
    pub metadata_path: String,

    /// Per-call timeout for probes, metadata fetches and forwards.
    pub timeout_ms: u64,

    /// Health probe attempts at startup.
    pub startup_retries: u32,

    /// Fixed delay between startup attempts.
    pub retry_delay_ms: u64,

    /// Background health probe interval.
    pub check_interval_secs: u64,

    /// Route templates always forwarded to the upstream, whatever the
    /// upstream route table says (e.g. "/legacy/:page").
    pub proxy_routes: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8081,
            context_path: String::new(),
            health_path: "/actuator/health".to_string(),
            metadata_path: "/actuator/mappings".to_string(),
            timeout_ms: 30_000,
            startup_retries: 5,
            retry_delay_ms: 2_000,
            check_interval_secs: 10,
            proxy_routes: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit JSON lines instead of human-readable logs.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Path prefix the admin endpoints are served under.
    pub path_prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            path_prefix: "/_admin".to_string(),
        }
    }
}

/// Session correlation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Track sessions and inject correlation headers into proxied requests.
    pub enabled: bool,

    pub cookie_name: String,

    /// Sessions untouched for this long are dropped.
    pub idle_timeout_secs: u64,

    /// Upper bound on stored sessions; the least recently used is evicted.
    pub max_sessions: usize,

    /// How often expired sessions are swept.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_name: "WFSESSION".to_string(),
            idle_timeout_secs: 1800,
            max_sessions: 100_000,
            sweep_interval_secs: 60,
        }
    }
}
