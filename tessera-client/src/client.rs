//! Tessera client.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;

use crate::config::ClientConfig;
use crate::context::{DefaultThreadContextFactory, ThreadContextFactory};
use crate::counter::AtomicCounterBuilder;
use crate::primitive::PrimitiveTypeRegistry;
use tessera_core::{PartitionService, Partitioner};

/// Tessera client.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

/// Client internal state.
pub(crate) struct ClientInner {
    pub(crate) config: Arc<ClientConfig>,
    /// The directory used to resolve partition groups.
    pub(crate) partitions: Arc<dyn PartitionService>,
    /// The factory of primitive execution contexts.
    pub(crate) contexts: Arc<dyn ThreadContextFactory>,
    pub(crate) primitive_types: PrimitiveTypeRegistry,
    pub(crate) partitioner: Partitioner,
    /// The runtime used to drive blocking calls.
    pub(crate) runtime: Handle,
}

impl Client {
    /// Construct a new client instance.
    ///
    /// Must be called from within a Tokio runtime. Primitive execution contexts are spawned onto
    /// that runtime.
    pub fn new(config: ClientConfig, partitions: Arc<dyn PartitionService>) -> Result<Self> {
        let runtime = Handle::try_current().context("a Tessera client must be created within a Tokio runtime")?;
        let contexts = Arc::new(DefaultThreadContextFactory::new(runtime.clone(), config.context_queue_depth));
        Ok(Self::build(config, partitions, contexts, runtime))
    }

    /// Construct a new client instance which creates execution contexts with the given factory.
    pub fn with_context_factory(config: ClientConfig, partitions: Arc<dyn PartitionService>, contexts: Arc<dyn ThreadContextFactory>) -> Result<Self> {
        let runtime = Handle::try_current().context("a Tessera client must be created within a Tokio runtime")?;
        Ok(Self::build(config, partitions, contexts, runtime))
    }

    fn build(config: ClientConfig, partitions: Arc<dyn PartitionService>, contexts: Arc<dyn ThreadContextFactory>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config: Arc::new(config),
                partitions,
                contexts,
                primitive_types: PrimitiveTypeRegistry::default(),
                partitioner: Partitioner::default(),
                runtime,
            }),
        }
    }

    /// This client's config.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The primitive types this client can build.
    pub fn primitive_types(&self) -> &PrimitiveTypeRegistry {
        &self.inner.primitive_types
    }

    /// Create a builder for the atomic counter of the given name.
    pub fn atomic_counter_builder(&self, name: &str) -> AtomicCounterBuilder {
        AtomicCounterBuilder::new(self.clone(), name)
    }
}
