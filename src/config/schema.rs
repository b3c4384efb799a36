//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the session gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Proxy settings: mount path, upstream target, timeouts.
    pub gateway: GatewaySettings,

    /// Session store settings.
    pub session: SessionConfig,

    /// Timeout configuration for the server middleware stack.
    pub timeouts: TimeoutConfig,

    /// Security hardening configuration.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Proxy settings for the gateway core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Path prefix under which the second application is exposed.
    /// Stripped from the path before forwarding.
    pub mount_path: String,

    /// Base URL of the second application (e.g., "http://localhost:3000").
    /// When absent, all gateway routes are disabled at startup.
    pub upstream_url: Option<String>,

    /// Upstream connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Upstream response-head timeout in milliseconds.
    /// Exceeding it is treated identically to a connection failure (502).
    pub request_timeout_ms: u64,

    /// Maximum HTML body size buffered for path rewriting.
    /// Larger bodies are passed through unrewritten.
    pub rewrite_buffer_max_bytes: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            mount_path: "/app".to_string(),
            upstream_url: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            rewrite_buffer_max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token.
    pub cookie_name: String,

    /// Session time-to-live in seconds. Touch extends expiry by this amount.
    pub ttl_secs: u64,

    /// Budget for the best-effort session touch in milliseconds.
    pub touch_timeout_ms: u64,

    /// Interval between expired-session sweeps in seconds.
    pub cleanup_interval_secs: u64,

    /// Production mode: expect secure cookies. Does not affect proxy behavior.
    pub production: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "connect.sid".to_string(),
            ttl_secs: 7 * 24 * 60 * 60,
            touch_timeout_ms: 1_000,
            cleanup_interval_secs: 600,
            production: false,
        }
    }
}

/// Timeout configuration for the server middleware stack.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall request timeout (time until response head) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound request body size in bytes. Unlimited when absent.
    pub max_body_bytes: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
