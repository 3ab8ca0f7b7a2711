//! Endpoint configuration for the external systems the core talks to.

use std::time::Duration;

use serde::Deserialize;

/// Default public OSRM instance.
pub const DEFAULT_ROUTING_URL: &str = "https://router.project-osrm.org";

// ============================================================================
// Configuration
// ============================================================================

/// REST backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL including any path prefix (e.g. `https://portal.example.com/api`).
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient GET failures (timeouts, 429, 5xx).
    pub max_retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            token: None,
            timeout_secs: 15,
            max_retries: 2,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Realtime channel configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Websocket URL.
    pub url: String,
    /// Bearer token for the handshake. Falls back to the API token when unset.
    pub token: Option<String>,
    /// Reconnect after transport drops. Server-initiated disconnects always reconnect.
    pub auto_reconnect: bool,
    pub reconnect_min_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_attempts: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000/socket".to_string(),
            token: None,
            auto_reconnect: true,
            reconnect_min_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
            reconnect_max_attempts: 20,
        }
    }
}

/// Routing provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// OSRM-compatible base URL.
    pub base_url: String,
    /// OSRM profile (`driving`, `car`, ...).
    pub profile: String,
    pub timeout_secs: u64,
    /// Route cache capacity (entries).
    pub cache_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ROUTING_URL.to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
            cache_capacity: 100,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
