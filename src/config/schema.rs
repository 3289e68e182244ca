//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and every
//! section falls back to its defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::execution::strategy::Offload;

/// Root configuration for a server built from a config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Worker pool and offloading defaults.
    pub execution: ExecutionConfig,

    /// HTTP protocol behaviour.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Explicit execution strategy. `None` leaves the strategy to the service and
    /// filter requirements; an empty list is an explicit "offload nothing".
    pub offloads: Option<Vec<Offload>>,

    /// Number of worker threads offloaded stages run on.
    pub worker_threads: usize,

    /// Name given to every worker thread.
    pub worker_thread_name: String,

    /// Submissions beyond this many queued or running tasks are rejected.
    pub max_pending_tasks: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            offloads: None,
            worker_threads: 4,
            worker_thread_name: "offload-worker".to_string(),
            max_pending_tasks: 1024,
        }
    }
}

/// HTTP protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Discard request payloads the service did not read so the connection stays
    /// reusable. When disabled, such connections are closed after the response.
    pub drain_request_payload_body: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            drain_request_payload_body: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
