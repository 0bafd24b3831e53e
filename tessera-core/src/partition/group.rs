//! Partition groups & the partition directory.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::error::AppError;
use crate::partition::{Partition, PartitionId};

/// A named, ordered set of partitions forming one replicated service.
#[derive(Clone, Debug)]
pub struct PartitionGroup {
    name: String,
    partitions: BTreeMap<PartitionId, Partition>,
}

impl PartitionGroup {
    /// Create a new instance. Every partition must be identified as a member of this group.
    pub fn new(name: &str, partitions: impl IntoIterator<Item = Partition>) -> Result<Self> {
        let mut members = BTreeMap::new();
        for partition in partitions {
            if partition.id().group() != name {
                bail!(AppError::InvalidInput(format!("partition {} does not belong to group {}", partition.id(), name)));
            }
            if members.insert(partition.id().clone(), partition.clone()).is_some() {
                bail!(AppError::InvalidInput(format!("duplicate partition {} in group {}", partition.id(), name)));
            }
        }
        Ok(Self {
            name: name.into(),
            partitions: members,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn partition(&self, id: &PartitionId) -> Option<&Partition> {
        self.partitions.get(id)
    }

    /// Get the target partition, failing with a routing error if it is not in this group.
    pub fn get_partition(&self, id: &PartitionId) -> Result<Partition> {
        match self.partitions.get(id) {
            Some(partition) => Ok(partition.clone()),
            None => bail!(AppError::Routing(format!("partition {} is not a member of group {}", id, self.name))),
        }
    }

    /// The ids of this group's partitions, in their stable order.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.keys().cloned().collect()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// A service which resolves partition groups by name.
#[async_trait]
pub trait PartitionService: Send + Sync + 'static {
    /// Resolve the named partition group.
    ///
    /// Unknown names fail with `AppError::Configuration`.
    async fn get_partition_group(&self, name: &str) -> Result<Arc<PartitionGroup>>;
}

type GroupsMap = BTreeMap<String, Arc<PartitionGroup>>;

/// A partition service over a set of registered groups.
#[derive(Clone, Default)]
pub struct PartitionDirectory {
    groups: Arc<ArcSwap<GroupsMap>>,
}

impl PartitionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group, replacing any group of the same name.
    pub fn register(&self, group: PartitionGroup) -> Arc<PartitionGroup> {
        let group = Arc::new(group);
        self.groups.rcu(|groups| {
            let mut updated = GroupsMap::clone(groups);
            updated.insert(group.name.clone(), group.clone());
            updated
        });
        tracing::debug!(group = %group.name, partitions = group.len(), "partition group registered");
        group
    }

    /// The names of all registered groups.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.load().keys().cloned().collect()
    }
}

#[async_trait]
impl PartitionService for PartitionDirectory {
    async fn get_partition_group(&self, name: &str) -> Result<Arc<PartitionGroup>> {
        match self.groups.load().get(name) {
            Some(group) => Ok(group.clone()),
            None => bail!(AppError::Configuration(format!("unknown partition group {}", name))),
        }
    }
}
