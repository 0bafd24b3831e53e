//! Primitive identity & service configuration.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// The default session timeout used by primitive services.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 5_000;

/// The type of a distributed primitive, such as `atomic-counter`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveType(String);

impl PrimitiveType {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The client assigned identity of a distributed primitive.
///
/// The name is the routing key used to select the primitive's partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveId {
    name: String,
    primitive_type: PrimitiveType,
}

impl PrimitiveId {
    pub fn new(name: &str, primitive_type: PrimitiveType) -> Self {
        Self { name: name.into(), primitive_type }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn primitive_type(&self) -> &PrimitiveType {
        &self.primitive_type
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primitive_type, self.name)
    }
}

/// Configuration of the replicated service backing a primitive.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// The duration after which the service expires an unresponsive session.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl ServiceConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}
