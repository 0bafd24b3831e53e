use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::client::Client;
use crate::config::{ClientConfig, DEFAULT_PARTITION_GROUP};
use crate::context::DefaultThreadContextFactory;
use crate::local::LocalPartitionService;
use tessera_core::{MemberId, Partition, PartitionDirectory, PartitionGroup, PartitionId, PartitionMetadata};
use tessera_core::{ProxySession, SessionProtocol, SessionTarget};

pub const MEMBERS: [&str; 3] = ["node-1", "node-2", "node-3"];

/// A client wired to a local partition service.
pub struct Harness {
    pub client: Client,
    pub local: LocalPartitionService,
    pub contexts: DefaultThreadContextFactory,
}

/// Build a client over a local service hosting the default group with the given number of partitions.
///
/// Must be called from within a Tokio runtime.
pub fn harness(partitions: u32) -> Result<Harness> {
    let local = LocalPartitionService::new();
    local.add_group(DEFAULT_PARTITION_GROUP, partitions, &MEMBERS)?;
    let contexts = DefaultThreadContextFactory::new(Handle::try_current()?, 100);
    let client = Client::with_context_factory(ClientConfig::default(), Arc::new(local.clone()), Arc::new(contexts.clone()))?;
    Ok(Harness { client, local, contexts })
}

/// A session protocol whose handshakes never complete.
pub struct StalledProtocol;

#[async_trait]
impl SessionProtocol for StalledProtocol {
    async fn connect(&self, _target: SessionTarget) -> Result<Arc<dyn ProxySession>> {
        futures::future::pending().await
    }
}

/// Build a client over a single partition whose sessions never connect.
///
/// Must be called from within a Tokio runtime.
pub fn stalled_client() -> Result<(Client, DefaultThreadContextFactory)> {
    let members = MEMBERS.iter().map(|member| MemberId::new(member)).collect();
    let partition = Partition::new(PartitionId::new(DEFAULT_PARTITION_GROUP, 1), PartitionMetadata::new(members)?, Arc::new(StalledProtocol));
    let directory = PartitionDirectory::new();
    directory.register(PartitionGroup::new(DEFAULT_PARTITION_GROUP, [partition])?);

    let contexts = DefaultThreadContextFactory::new(Handle::try_current()?, 100);
    let client = Client::with_context_factory(ClientConfig::default(), Arc::new(directory), Arc::new(contexts.clone()))?;
    Ok((client, contexts))
}
