//! Partition metadata.
//!
//! A partition is one replicated shard of a partition group, with its own term, primary and
//! replica set. The metadata of a partition is owned by the consensus layer, which publishes a
//! complete new record on every change. Everything else reads whole published records, so a
//! reader never observes the backups of one term alongside the primary of another.

mod group;
#[cfg(test)]
mod group_test;

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use arc_swap::ArcSwap;

use crate::error::AppError;
use crate::primitive::{PrimitiveType, ServiceConfig};
use crate::session::{SessionBuilder, SessionProtocol, SessionTarget};

pub use group::{PartitionDirectory, PartitionGroup, PartitionService};

/// The term of a newly created partition.
pub const INITIAL_TERM: u64 = 1;

/// The identifier of a partition within its partition group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId {
    group: String,
    id: u32,
}

impl PartitionId {
    pub fn new(group: &str, id: u32) -> Self {
        Self { group: group.into(), id }
    }

    /// The name of the group this partition belongs to.
    pub fn group(&self) -> &str {
        self.group.as_str()
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

/// The identifier of a cluster member.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: &str) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published, immutable record of a partition's replication state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionMetadata {
    term: u64,
    members: Vec<MemberId>,
    primary: Option<MemberId>,
    /// Always `members` without `primary`.
    backups: Vec<MemberId>,
}

impl PartitionMetadata {
    /// Metadata for a newly created partition, with no known primary.
    pub fn new(members: Vec<MemberId>) -> Result<Self> {
        if members.is_empty() {
            bail!(AppError::InvalidInput("a partition requires at least one member".into()));
        }
        for (offset, member) in members.iter().enumerate() {
            if members[..offset].contains(member) {
                bail!(AppError::InvalidInput(format!("duplicate partition member {}", member)));
            }
        }
        Ok(Self {
            term: INITIAL_TERM,
            backups: members.clone(),
            members,
            primary: None,
        })
    }

    /// Build the record which follows this one after the given leadership change.
    ///
    /// Terms never regress, and within a single term a known primary never changes.
    pub fn next(&self, term: u64, primary: Option<MemberId>) -> Result<Self> {
        if term < self.term {
            bail!(AppError::StaleTerm {
                observed: term,
                current: self.term
            });
        }
        if let Some(member) = primary.as_ref() {
            if !self.members.contains(member) {
                bail!(AppError::InvalidInput(format!("primary {} is not a member of the partition", member)));
            }
        }
        if term == self.term && self.primary.is_some() && self.primary != primary {
            bail!(AppError::InvalidInput(format!("a primary has already been published for term {}", term)));
        }
        let backups = self
            .members
            .iter()
            .filter(|member| Some(*member) != primary.as_ref())
            .cloned()
            .collect();
        Ok(Self {
            term,
            members: self.members.clone(),
            primary,
            backups,
        })
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub fn primary(&self) -> Option<&MemberId> {
        self.primary.as_ref()
    }

    pub fn backups(&self) -> &[MemberId] {
        &self.backups
    }
}

/// A replicated partition.
///
/// Instances are cheap to clone, and all clones observe the same published metadata.
#[derive(Clone)]
pub struct Partition {
    inner: Arc<PartitionInner>,
}

struct PartitionInner {
    id: PartitionId,
    /// The latest published metadata record.
    metadata: ArcSwap<PartitionMetadata>,
    /// The session protocol used to reach this partition's state machine.
    protocol: Arc<dyn SessionProtocol>,
}

impl Partition {
    /// Create a new instance.
    pub fn new(id: PartitionId, metadata: PartitionMetadata, protocol: Arc<dyn SessionProtocol>) -> Self {
        Self {
            inner: Arc::new(PartitionInner {
                id,
                metadata: ArcSwap::from_pointee(metadata),
                protocol,
            }),
        }
    }

    pub fn id(&self) -> &PartitionId {
        &self.inner.id
    }

    pub fn term(&self) -> u64 {
        self.inner.metadata.load().term
    }

    pub fn members(&self) -> Vec<MemberId> {
        self.inner.metadata.load().members.clone()
    }

    pub fn primary(&self) -> Option<MemberId> {
        self.inner.metadata.load().primary.clone()
    }

    pub fn backups(&self) -> Vec<MemberId> {
        self.inner.metadata.load().backups.clone()
    }

    /// The full metadata record currently published for this partition.
    ///
    /// Use this rather than the individual accessors when more than one field is needed, as
    /// separate accessor calls may observe different records.
    pub fn metadata(&self) -> Arc<PartitionMetadata> {
        self.inner.metadata.load_full()
    }

    /// Publish a leadership change for this partition.
    ///
    /// This is the entry point used by the consensus layer. The record is replaced atomically
    /// and only if the transition is valid for the record it replaces.
    #[tracing::instrument(level = "debug", skip(self), fields(partition = %self.inner.id))]
    pub fn publish_primary(&self, term: u64, primary: Option<MemberId>) -> Result<Arc<PartitionMetadata>> {
        loop {
            let current = self.inner.metadata.load_full();
            let next = Arc::new(current.next(term, primary.clone())?);
            let prev = self.inner.metadata.compare_and_swap(&current, next.clone());
            if Arc::ptr_eq(&*prev, &current) {
                tracing::debug!(term, primary = ?next.primary, "partition metadata published");
                return Ok(next);
            }
        }
    }

    /// Ensure the given term is not older than this partition's current term.
    pub fn check_term(&self, observed: u64) -> Result<()> {
        let current = self.term();
        if observed < current {
            bail!(AppError::StaleTerm { observed, current });
        }
        Ok(())
    }

    /// Create a builder for a session between the named primitive and this partition.
    ///
    /// The partition's routing information is captured now; the handshake itself happens
    /// when the builder is connected.
    pub fn session_builder(&self, primitive_name: &str, primitive_type: PrimitiveType, config: ServiceConfig) -> SessionBuilder {
        let metadata = self.metadata();
        let target = SessionTarget {
            partition: self.inner.id.clone(),
            term: metadata.term,
            primary: metadata.primary.clone(),
            members: metadata.members.clone(),
            primitive_name: primitive_name.into(),
            primitive_type,
            config,
        };
        SessionBuilder::new(self.inner.protocol.clone(), target)
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("id", &self.inner.id)
            .field("metadata", &self.metadata())
            .finish()
    }
}
