//! Tessera core.
//!
//! The data model shared by Tessera clients and the consensus layer: partition metadata and
//! partition groups, the deterministic partitioner, the proxy session seam, and the on-disk
//! snapshot format used to compact replicated state machine logs.

pub mod error;
#[cfg(test)]
mod fixtures;
pub mod partition;
pub mod partitioner;
#[cfg(test)]
mod partitioner_test;
pub mod primitive;
pub mod session;
#[cfg(test)]
mod session_test;
pub mod snapshot;

pub use error::AppError;
pub use partition::{MemberId, Partition, PartitionDirectory, PartitionGroup, PartitionId, PartitionMetadata, PartitionService};
pub use partitioner::Partitioner;
pub use primitive::{PrimitiveId, PrimitiveType, ServiceConfig};
pub use session::{PrimitiveOperation, ProxySession, SessionBuilder, SessionProtocol, SessionTarget};
pub use snapshot::{Snapshot, SnapshotDescriptor, SnapshotStore};
