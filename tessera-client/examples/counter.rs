//! A counter bound to a partition of a local partition group.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tessera_client::local::LocalPartitionService;
use tessera_client::{register_client_metrics, Client, ClientConfig, SnapshotStore};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::new()?;

    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the RUST_LOG env var.
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        // Send a copy of all spans to stdout in compact form.
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true).with_ansi(true))
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;
    register_client_metrics();

    let local = LocalPartitionService::new();
    local.add_group(&config.partition_group, 3, &["node-1", "node-2", "node-3"])?;
    let client = Client::new(config, Arc::new(local.clone()))?;

    let counter = client.atomic_counter_builder("demo").build_async().await?;
    tracing::info!(partition = %counter.partition_id(), "counter connected");
    for _ in 0..5 {
        let value = counter.increment_and_get().await?;
        tracing::info!(value, "counter incremented");
    }
    let swapped = counter.compare_and_set(5, 100).await?;
    let value = counter.get().await?;
    tracing::info!(swapped, value, "compare-and-set applied");

    let dir = std::env::temp_dir().join("tessera-demo");
    let store = SnapshotStore::open(&dir, "demo").await?;
    let snapshot = local.snapshot_partition(counter.partition_id(), &store).await?;
    tracing::info!(path = ?snapshot.path(), index = snapshot.descriptor().index(), "partition snapshot taken");

    counter.set(0).await?;
    local.restore_partition(counter.partition_id(), &store).await?;
    let value = counter.get().await?;
    tracing::info!(value, "partition restored from snapshot");
    counter.close().await?;

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    Ok(())
}
