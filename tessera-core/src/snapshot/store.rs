//! File backed snapshot store.
//!
//! Each snapshot lives in its own file named `{name}-{index}.snapshot`, holding a descriptor
//! header followed by the state machine data. Files are written under a temporary name and
//! renamed into place once synced, and only locked descriptors are considered complete.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::AppError;
use crate::snapshot::descriptor::{SnapshotDescriptor, BYTES};

const SNAPSHOT_EXTENSION: &str = "snapshot";
const TMP_EXTENSION: &str = "tmp";

/// A persisted snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    descriptor: SnapshotDescriptor,
    path: PathBuf,
}

impl Snapshot {
    /// The snapshot's header.
    pub fn descriptor(&self) -> &SnapshotDescriptor {
        &self.descriptor
    }

    /// The path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state machine data of this snapshot.
    pub async fn read_data(&self) -> Result<Vec<u8>> {
        let mut bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("error reading snapshot file {}", self.path.display()))?;
        if bytes.len() < BYTES {
            bail!(AppError::CorruptData(format!("snapshot file {} is truncated", self.path.display())));
        }
        Ok(bytes.split_off(BYTES))
    }
}

/// A directory of snapshots belonging to a single state machine.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    name: String,
}

impl SnapshotStore {
    /// Open the store, creating its directory as needed.
    pub async fn open(dir: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("error creating snapshot dir {}", dir.display()))?;
        Ok(Self { dir, name: name.into() })
    }

    /// Persist a new snapshot for the given descriptor.
    ///
    /// The stored descriptor is always locked; the returned snapshot reflects what is on disk.
    #[tracing::instrument(level = "debug", skip(self, descriptor, data), fields(name = %self.name, index = descriptor.index()))]
    pub async fn create(&self, descriptor: SnapshotDescriptor, data: &[u8]) -> Result<Snapshot> {
        let descriptor = descriptor.lock();
        let path = self.snapshot_path(descriptor.index());
        let tmp_path = path.with_extension(TMP_EXTENSION);

        let mut buf = Vec::with_capacity(BYTES + data.len());
        buf.extend_from_slice(&descriptor.encode());
        buf.extend_from_slice(data);

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("error creating snapshot file {}", tmp_path.display()))?;
        file.write_all(&buf).await.context("error writing snapshot data")?;
        file.sync_all().await.context("error syncing snapshot data")?;
        drop(file);
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("error moving snapshot into place at {}", path.display()))?;

        tracing::debug!(path = %path.display(), "snapshot written");
        Ok(Snapshot { descriptor, path })
    }

    /// All complete snapshots in the store, ordered by index.
    pub async fn snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("error listing snapshot dir {}", self.dir.display()))?;
        let mut snapshots = vec![];
        while let Some(entry) = entries.next_entry().await.context("error listing snapshot dir")? {
            let path = entry.path();
            if self.parse_index(&path).is_none() {
                continue;
            }
            match read_descriptor(&path).await {
                Ok(descriptor) if descriptor.is_locked() => snapshots.push(Snapshot { descriptor, path }),
                Ok(_) => tracing::debug!(path = %path.display(), "skipping incomplete snapshot"),
                Err(err) => tracing::warn!(error = ?err, path = %path.display(), "skipping unreadable snapshot"),
            }
        }
        snapshots.sort_by_key(|snapshot| snapshot.descriptor.index());
        Ok(snapshots)
    }

    /// The most recent complete snapshot, if any.
    pub async fn current(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshots().await?.pop())
    }

    /// Delete all snapshots with an index lower than the given index, returning the number
    /// of snapshots deleted.
    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    pub async fn purge_before(&self, index: u64) -> Result<usize> {
        let mut purged = 0;
        for snapshot in self.snapshots().await? {
            if snapshot.descriptor.index() >= index {
                continue;
            }
            tokio::fs::remove_file(&snapshot.path)
                .await
                .with_context(|| format!("error removing snapshot {}", snapshot.path.display()))?;
            purged += 1;
        }
        Ok(purged)
    }

    fn snapshot_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}-{}.{}", self.name, index, SNAPSHOT_EXTENSION))
    }

    /// Parse the index out of a snapshot file name belonging to this store.
    fn parse_index(&self, path: &Path) -> Option<u64> {
        if path.extension()? != SNAPSHOT_EXTENSION {
            return None;
        }
        path.file_stem()?
            .to_str()?
            .strip_prefix(self.name.as_str())?
            .strip_prefix('-')?
            .parse()
            .ok()
    }
}

async fn read_descriptor(path: &Path) -> Result<SnapshotDescriptor> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("error opening snapshot file {}", path.display()))?;
    let mut header = Vec::with_capacity(BYTES);
    file.take(BYTES as u64)
        .read_to_end(&mut header)
        .await
        .context("error reading snapshot header")?;
    SnapshotDescriptor::decode(&header)
}
