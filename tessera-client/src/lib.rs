//! The Tessera client.
//!
//! Distributed primitives are bound to exactly one partition of a partition group, selected by
//! hashing the primitive's name. Each primitive owns a session with its partition and a
//! dedicated execution context which delivers operation results in the order the operations
//! were issued.

mod client;
mod config;
mod context;
mod counter;
#[cfg(test)]
mod fixtures;
pub mod local;
mod primitive;
#[cfg(test)]
mod primitive_test;
mod prom;
mod proto;
mod utils;

pub use crate::client::Client;
pub use crate::config::ClientConfig;
pub use crate::context::{DefaultThreadContextFactory, ThreadContext, ThreadContextFactory};
pub use crate::counter::{AsyncAtomicCounter, AtomicCounter, AtomicCounterBuilder, ATOMIC_COUNTER};
pub use crate::primitive::{PrimitiveProxy, PrimitiveTypeRegistry};
pub use crate::prom::register_client_metrics;
pub use async_trait::async_trait;
pub use tessera_core::{
    AppError, MemberId, Partition, PartitionDirectory, PartitionGroup, PartitionId, PartitionService, PrimitiveId, PrimitiveOperation, PrimitiveType,
    ProxySession, ServiceConfig, SessionProtocol, SessionTarget, Snapshot, SnapshotDescriptor, SnapshotStore,
};
