//! Client configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use tessera_core::primitive::DEFAULT_SESSION_TIMEOUT_MS;
use tessera_core::ServiceConfig;

/// The partition group used by primitives which do not name one.
pub const DEFAULT_PARTITION_GROUP: &str = "raft";
/// The default maximum number of in-flight operations per primitive.
pub const DEFAULT_CONTEXT_QUEUE_DEPTH: usize = 1000;

/// Client configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// The client's logging config, which uses Rust's `env_logger` directives.
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    /// The partition group used by primitives which do not name one.
    #[serde(default = "default_partition_group")]
    pub partition_group: String,
    /// The maximum number of operations a primitive's execution context keeps in flight.
    #[serde(default = "default_context_queue_depth")]
    pub context_queue_depth: usize,
    /// The session timeout requested for primitive services.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl ClientConfig {
    /// Create a new config instance from the runtime environment.
    pub fn new() -> Result<Self> {
        envy::from_env().context("error building client config from env")
    }

    /// The service config requested for new primitives.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            session_timeout_ms: self.session_timeout_ms,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rust_log: default_rust_log(),
            partition_group: default_partition_group(),
            context_queue_depth: default_context_queue_depth(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

fn default_rust_log() -> String {
    "info".into()
}

fn default_partition_group() -> String {
    DEFAULT_PARTITION_GROUP.into()
}

fn default_context_queue_depth() -> usize {
    DEFAULT_CONTEXT_QUEUE_DEPTH
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}
