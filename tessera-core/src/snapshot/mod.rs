//! Snapshot persistence.
//!
//! Replicated state machines periodically compact their logs into snapshots. Each snapshot
//! is stored as a fixed size `SnapshotDescriptor` header followed by the opaque state bytes
//! of the state machine.

mod descriptor;
mod store;

pub use descriptor::{SnapshotDescriptor, SnapshotDescriptorBuilder, BYTES, VERSION_1, VERSION_2, VERSION_POSITION};
pub use store::{Snapshot, SnapshotStore};
