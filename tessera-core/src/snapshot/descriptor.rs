//! Snapshot descriptor codec.
//!
//! The descriptor is a fixed width, big-endian header. Its layout has evolved over time, so the
//! version tag is always read first and the rest of the header is decoded according to the
//! layout of that version. Writers only ever emit the current layout.
//!
//! ```text
//! offset | width | field     | versions
//! -------+-------+-----------+---------
//! 0      | 8     | index     | 1, 2
//! 8      | 8     | timestamp | 1, 2
//! 16     | 4     | version   | 1, 2
//! 20     | 1     | locked    | 1, 2
//! 21     | 8     | term      | 2
//! ```

use anyhow::{bail, Result};

use crate::error::AppError;

/// The legacy descriptor layout, which did not persist a term.
pub const VERSION_1: u32 = 1;
/// The current descriptor layout.
pub const VERSION_2: u32 = 2;
/// The encoded length of a descriptor, for all versions.
pub const BYTES: usize = 64;
/// The byte offset of the version tag.
pub const VERSION_POSITION: usize = 16;

const INDEX_POSITION: usize = 0;
const TIMESTAMP_POSITION: usize = 8;
const LOCKED_POSITION: usize = 20;
const TERM_POSITION: usize = 21;
/// The term reported by descriptors written before terms were persisted.
const LEGACY_TERM: u64 = 1;

/// The header of a persisted snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    index: u64,
    timestamp: u64,
    term: u64,
    version: u32,
    locked: bool,
}

impl SnapshotDescriptor {
    /// Create a new builder. Descriptors built this way always use the current version.
    pub fn builder() -> SnapshotDescriptorBuilder {
        SnapshotDescriptorBuilder::default()
    }

    /// Decode a descriptor from the head of the given buffer.
    ///
    /// Fails with `AppError::CorruptData` if the buffer is shorter than `BYTES` or carries an
    /// unknown version tag.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < BYTES {
            bail!(AppError::CorruptData(format!(
                "snapshot descriptor requires {} bytes, got {}",
                BYTES,
                buf.len()
            )));
        }
        let version = read_u32(buf, VERSION_POSITION);
        let term = match version {
            VERSION_1 => LEGACY_TERM,
            VERSION_2 => read_u64(buf, TERM_POSITION),
            unknown => bail!(AppError::CorruptData(format!("unknown snapshot descriptor version {}", unknown))),
        };
        Ok(Self {
            index: read_u64(buf, INDEX_POSITION),
            timestamp: read_u64(buf, TIMESTAMP_POSITION),
            term,
            version,
            locked: buf[LOCKED_POSITION] != 0,
        })
    }

    /// Write this descriptor into the head of the given buffer.
    ///
    /// The current layout is always written, so a descriptor decoded from a legacy header is
    /// upgraded when it is written back out.
    pub fn copy_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < BYTES {
            bail!(AppError::CorruptData(format!(
                "snapshot descriptor requires {} bytes, buffer has {}",
                BYTES,
                buf.len()
            )));
        }
        let header = &mut buf[..BYTES];
        header.fill(0);
        header[INDEX_POSITION..INDEX_POSITION + 8].copy_from_slice(&self.index.to_be_bytes());
        header[TIMESTAMP_POSITION..TIMESTAMP_POSITION + 8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[VERSION_POSITION..VERSION_POSITION + 4].copy_from_slice(&VERSION_2.to_be_bytes());
        header[LOCKED_POSITION] = self.locked as u8;
        header[TERM_POSITION..TERM_POSITION + 8].copy_from_slice(&self.term.to_be_bytes());
        Ok(())
    }

    /// Encode this descriptor as a new header.
    pub fn encode(&self) -> [u8; BYTES] {
        let mut header = [0u8; BYTES];
        // The header is exactly `BYTES` long, so this can not fail.
        let _ = self.copy_to(&mut header);
        header
    }

    /// The index of the last log entry covered by the snapshot.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The state machine timestamp at which the snapshot was taken, in milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The term of the last log entry covered by the snapshot.
    pub fn term(&self) -> u64 {
        self.term
    }

    /// The layout version this descriptor was built with or decoded from.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether the snapshot data following this header was completely written.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Return a copy of this descriptor marked as completely written.
    pub fn lock(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// A builder of snapshot descriptors.
#[derive(Clone, Debug, Default)]
pub struct SnapshotDescriptorBuilder {
    index: u64,
    timestamp: u64,
    term: Option<u64>,
}

impl SnapshotDescriptorBuilder {
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_term(mut self, term: u64) -> Self {
        self.term = Some(term);
        self
    }

    pub fn build(self) -> SnapshotDescriptor {
        SnapshotDescriptor {
            index: self.index,
            timestamp: self.timestamp,
            term: self.term.unwrap_or(LEGACY_TERM),
            version: VERSION_2,
            locked: false,
        }
    }
}

fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_be_bytes(bytes)
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_be_bytes(bytes)
}
