//! Primitive to partition routing.

use std::hash::Hasher;

use anyhow::{bail, Result};

use crate::error::AppError;
use crate::partition::PartitionId;

/// Deterministically maps primitive names onto the partitions of a group.
///
/// Placement is a SeaHash of the primitive name, taken modulo the number of partitions and
/// used as an offset into the group's ordered partition ids. SeaHash uses fixed seeds, so every
/// client computes the same placement for a name without coordination.
#[derive(Clone, Copy, Debug, Default)]
pub struct Partitioner;

impl Partitioner {
    /// Select the partition which owns the named primitive.
    pub fn partition(&self, name: &str, ids: &[PartitionId]) -> Result<PartitionId> {
        if ids.is_empty() {
            bail!(AppError::Configuration(format!("no partitions available for primitive {}", name)));
        }
        let mut hasher = seahash::SeaHasher::default();
        hasher.write(name.as_bytes());
        let offset = (hasher.finish() % ids.len() as u64) as usize;
        match ids.get(offset) {
            Some(id) => Ok(id.clone()),
            None => bail!(AppError::Routing(format!("offset {} is outside of the {} partitions given", offset, ids.len()))),
        }
    }
}
