use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::error::AppError;
use crate::partition::{MemberId, Partition, PartitionId, PartitionMetadata};
use crate::session::{PrimitiveOperation, ProxySession, SessionProtocol, SessionTarget};

/// A session protocol with a fixed behavior, used for testing.
pub enum FixtureProtocol {
    /// Accept all sessions, echoing operation payloads.
    Accept,
    /// Fail all handshakes with a transport level error.
    Unreachable,
    /// Fail all handshakes with a configuration error.
    Misconfigured,
}

#[async_trait]
impl SessionProtocol for FixtureProtocol {
    async fn connect(&self, target: SessionTarget) -> Result<Arc<dyn ProxySession>> {
        match self {
            Self::Accept => Ok(Arc::new(EchoSession { target })),
            Self::Unreachable => Err(anyhow!("connection refused by {:?}", target.primary)),
            Self::Misconfigured => bail!(AppError::Configuration(format!("unknown service {}", target.primitive_type))),
        }
    }
}

/// A session which echoes operation payloads.
pub struct EchoSession {
    pub target: SessionTarget,
}

#[async_trait]
impl ProxySession for EchoSession {
    fn session_id(&self) -> u64 {
        1
    }

    fn partition_id(&self) -> &PartitionId {
        &self.target.partition
    }

    fn term(&self) -> u64 {
        self.target.term
    }

    async fn execute(&self, operation: PrimitiveOperation) -> Result<Vec<u8>> {
        Ok(operation.payload)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Build a partition of the given group with the given members.
pub fn partition(group: &str, id: u32, members: &[&str], protocol: FixtureProtocol) -> Result<Partition> {
    let metadata = PartitionMetadata::new(members.iter().map(|member| MemberId::new(member)).collect())?;
    Ok(Partition::new(PartitionId::new(group, id), metadata, Arc::new(protocol)))
}
