use anyhow::Result;

use crate::client::Client;
use crate::counter::{AsyncAtomicCounter, AtomicCounter, ATOMIC_COUNTER};
use tessera_core::{PrimitiveId, PrimitiveType, ServiceConfig};

/// A builder of atomic counters.
pub struct AtomicCounterBuilder {
    client: Client,
    id: PrimitiveId,
    group: String,
    config: ServiceConfig,
}

impl AtomicCounterBuilder {
    pub(crate) fn new(client: Client, name: &str) -> Self {
        let group = client.config().partition_group.clone();
        let config = client.config().service_config();
        Self {
            client,
            id: PrimitiveId::new(name, PrimitiveType::new(ATOMIC_COUNTER)),
            group,
            config,
        }
    }

    /// Build the counter on the named partition group instead of the client's default group.
    pub fn with_partition_group(mut self, group: &str) -> Self {
        self.group = group.into();
        self
    }

    /// Use the given service config for the counter.
    pub fn with_service_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the session timeout requested for the counter's service.
    pub fn with_session_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.session_timeout_ms = timeout_ms;
        self
    }

    /// Build the counter.
    pub async fn build_async(self) -> Result<AsyncAtomicCounter> {
        let proxy = self.client.connect_primitive(self.id, &self.group, self.config).await?;
        Ok(AsyncAtomicCounter::new(proxy))
    }

    /// Build the counter, blocking the current thread until it is connected.
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn build(self) -> Result<AtomicCounter> {
        let runtime = self.client.inner.runtime.clone();
        runtime.block_on(self.build_async()).map(AsyncAtomicCounter::sync)
    }
}
