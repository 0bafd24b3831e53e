//! Proxy sessions.
//!
//! A proxy session is the client's ordered channel of operations against a single partition's
//! replicated state machine. Establishing and driving sessions is the job of the session
//! protocol, which is provided by the transport layer; this module defines the contract the
//! rest of Tessera relies upon.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::AppError;
use crate::partition::{MemberId, PartitionId};
use crate::primitive::{PrimitiveType, ServiceConfig};

/// An operation submitted to a primitive's replicated service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimitiveOperation {
    /// The name of the operation, as understood by the primitive's service.
    pub id: String,
    /// The encoded operation arguments.
    pub payload: Vec<u8>,
}

impl PrimitiveOperation {
    pub fn new(id: &str, payload: Vec<u8>) -> Self {
        Self { id: id.into(), payload }
    }
}

/// The routing information captured for a session at the time its builder was created.
#[derive(Clone, Debug)]
pub struct SessionTarget {
    pub partition: PartitionId,
    pub term: u64,
    pub primary: Option<MemberId>,
    pub members: Vec<MemberId>,
    pub primitive_name: String,
    pub primitive_type: PrimitiveType,
    pub config: ServiceConfig,
}

/// The protocol used to establish sessions with partitions.
#[async_trait]
pub trait SessionProtocol: Send + Sync + 'static {
    /// Perform the session handshake with the target partition.
    async fn connect(&self, target: SessionTarget) -> Result<Arc<dyn ProxySession>>;
}

/// An established session between a primitive and a partition's state machine.
#[async_trait]
pub trait ProxySession: Send + Sync + 'static {
    /// The session identifier assigned by the partition.
    fn session_id(&self) -> u64;

    /// The partition this session is bound to.
    fn partition_id(&self) -> &PartitionId;

    /// The partition term observed when the session was established.
    fn term(&self) -> u64;

    /// Execute an operation against the primitive's service, returning the encoded output.
    ///
    /// Retries, timeouts and leader discovery are the responsibility of the implementation.
    async fn execute(&self, operation: PrimitiveOperation) -> Result<Vec<u8>>;

    /// Close the session, releasing its server side state.
    async fn close(&self) -> Result<()>;
}

/// A builder of a session between a primitive and a partition.
pub struct SessionBuilder {
    protocol: Arc<dyn SessionProtocol>,
    target: SessionTarget,
}

impl SessionBuilder {
    pub(crate) fn new(protocol: Arc<dyn SessionProtocol>, target: SessionTarget) -> Self {
        Self { protocol, target }
    }

    /// The routing information which will be used to connect.
    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Connect the session.
    ///
    /// Errors raised by the protocol as `AppError`s are returned as is, all other failures are
    /// reported as `AppError::Connection`.
    #[tracing::instrument(level = "debug", skip(self), fields(partition = %self.target.partition, primitive = %self.target.primitive_name))]
    pub async fn connect(self) -> Result<Arc<dyn ProxySession>> {
        match self.protocol.connect(self.target).await {
            Ok(session) => {
                tracing::debug!(session = session.session_id(), term = session.term(), "session connected");
                Ok(session)
            }
            Err(err) => match err.downcast::<AppError>() {
                Ok(app_err) => Err(app_err.into()),
                Err(err) => Err(AppError::Connection(err).into()),
            },
        }
    }
}
