//! Primitive construction & the untyped primitive proxy.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Result};
use prost::Message;

use crate::client::Client;
use crate::context::ThreadContext;
use crate::counter::ATOMIC_COUNTER;
use crate::prom::{METRIC_OPERATIONS, METRIC_SESSIONS_OPENED};
use crate::utils;
use tessera_core::{AppError, PartitionId, PrimitiveId, PrimitiveOperation, PrimitiveType, ProxySession, ServiceConfig};

/// The set of primitive types known to a client.
#[derive(Clone, Debug)]
pub struct PrimitiveTypeRegistry {
    types: BTreeSet<PrimitiveType>,
}

impl PrimitiveTypeRegistry {
    /// Check if the given type is registered.
    pub fn contains(&self, primitive_type: &PrimitiveType) -> bool {
        self.types.contains(primitive_type)
    }

    /// Iterate over all registered types.
    pub fn types(&self) -> impl Iterator<Item = &PrimitiveType> {
        self.types.iter()
    }

    /// Ensure the given type is registered, else return a configuration error.
    pub fn ensure(&self, primitive_type: &PrimitiveType) -> Result<()> {
        if !self.contains(primitive_type) {
            bail!(AppError::Configuration(format!("unknown primitive type {}", primitive_type)));
        }
        Ok(())
    }
}

impl Default for PrimitiveTypeRegistry {
    fn default() -> Self {
        Self {
            types: [PrimitiveType::new(ATOMIC_COUNTER)].into_iter().collect(),
        }
    }
}

impl Client {
    /// Connect to the primitive of the given ID on the named partition group.
    ///
    /// The primitive is bound to the partition selected for its name, and is given a dedicated
    /// execution context. If the session can not be established, the context is closed before
    /// the error is returned.
    #[tracing::instrument(level = "debug", skip(self, id, config), fields(primitive = %id))]
    pub async fn connect_primitive(&self, id: PrimitiveId, group: &str, config: ServiceConfig) -> Result<PrimitiveProxy> {
        self.inner.primitive_types.ensure(id.primitive_type())?;
        let group = self.inner.partitions.get_partition_group(group).await?;
        let partition_id = self.inner.partitioner.partition(id.name(), &group.partition_ids())?;
        let partition = group.get_partition(&partition_id)?;
        tracing::debug!(partition = %partition_id, "primitive bound to partition");

        let context = self.inner.contexts.create_context()?;
        let builder = partition.session_builder(id.name(), id.primitive_type().clone(), config);
        let session = match builder.connect().await {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(error = ?err, context = %context.id(), "error connecting primitive session, closing execution context");
                context.close().await;
                return Err(err);
            }
        };
        metrics::increment_counter!(METRIC_SESSIONS_OPENED);
        Ok(PrimitiveProxy::new(id, partition_id, session, context))
    }
}

/// A connected primitive, issuing raw operations against its partition.
#[derive(Clone)]
pub struct PrimitiveProxy {
    inner: Arc<PrimitiveProxyInner>,
}

struct PrimitiveProxyInner {
    id: PrimitiveId,
    partition: PartitionId,
    session: Arc<dyn ProxySession>,
    context: ThreadContext,
}

impl PrimitiveProxy {
    fn new(id: PrimitiveId, partition: PartitionId, session: Arc<dyn ProxySession>, context: ThreadContext) -> Self {
        Self {
            inner: Arc::new(PrimitiveProxyInner { id, partition, session, context }),
        }
    }

    /// The ID of this primitive.
    pub fn id(&self) -> &PrimitiveId {
        &self.inner.id
    }

    /// The partition this primitive is bound to.
    pub fn partition_id(&self) -> &PartitionId {
        &self.inner.partition
    }

    /// The ID of this primitive's session.
    pub fn session_id(&self) -> u64 {
        self.inner.session.session_id()
    }

    /// The partition term observed by this primitive's session.
    pub fn term(&self) -> u64 {
        self.inner.session.term()
    }

    /// This primitive's execution context.
    pub fn context(&self) -> &ThreadContext {
        &self.inner.context
    }

    /// Execute the given operation on this primitive's session.
    ///
    /// The operation is issued when this method is called; results are delivered in issue order.
    pub fn execute(&self, operation: PrimitiveOperation) -> impl Future<Output = Result<Vec<u8>>> + Send + 'static {
        let session = self.inner.session.clone();
        if !self.inner.context.is_closed() {
            metrics::increment_counter!(METRIC_OPERATIONS);
        }
        self.inner.context.execute(async move { session.execute(operation).await })
    }

    /// Execute the given operation with a prost encoded request & response.
    pub(crate) fn invoke<Req, Res>(&self, operation: &str, request: &Req) -> impl Future<Output = Result<Res>> + Send + 'static
    where
        Req: Message,
        Res: Message + Default + 'static,
    {
        let issued = utils::encode_model(request).map(|payload| self.execute(PrimitiveOperation::new(operation, payload)));
        async move {
            let output = issued?.await?;
            utils::decode_model(&output)
        }
    }

    /// Close this primitive.
    ///
    /// The session is closed after all previously issued operations have been delivered, then
    /// the execution context is stopped. Closing an already closed primitive is a no-op.
    #[tracing::instrument(level = "debug", skip(self), fields(primitive = %self.inner.id))]
    pub async fn close(&self) -> Result<()> {
        if self.inner.context.is_closed() {
            return Ok(());
        }
        let session = self.inner.session.clone();
        let res = self.inner.context.execute(async move { session.close().await }).await;
        self.inner.context.close().await;
        res
    }
}
