use anyhow::{Context, Result};

use crate::error::AppError;
use crate::fixtures::{self, FixtureProtocol};
use crate::partition::{PartitionDirectory, PartitionGroup, PartitionId, PartitionService};

fn group(name: &str, count: u32) -> Result<PartitionGroup> {
    let partitions = (1..=count)
        .rev()
        .map(|id| fixtures::partition(name, id, &["a", "b", "c"], FixtureProtocol::Accept))
        .collect::<Result<Vec<_>>>()?;
    PartitionGroup::new(name, partitions)
}

#[test]
fn partition_ids_are_ordered() -> Result<()> {
    let group = group("raft", 5)?;

    let ids = group.partition_ids();

    let expected: Vec<PartitionId> = (1..=5).map(|id| PartitionId::new("raft", id)).collect();
    assert_eq!(ids, expected, "expected partition ids in stable order");
    Ok(())
}

#[test]
fn group_rejects_foreign_and_duplicate_partitions() -> Result<()> {
    let foreign = vec![fixtures::partition("other", 1, &["a"], FixtureProtocol::Accept)?];
    let duplicate = vec![
        fixtures::partition("raft", 1, &["a"], FixtureProtocol::Accept)?,
        fixtures::partition("raft", 1, &["b"], FixtureProtocol::Accept)?,
    ];

    for partitions in [foreign, duplicate] {
        let err = PartitionGroup::new("raft", partitions).unwrap_err();
        let app_err = err.downcast::<AppError>().context("unexpected error type")?;
        assert!(matches!(app_err, AppError::InvalidInput(_)), "expected InvalidInput, got {:?}", app_err);
    }
    Ok(())
}

#[test]
fn get_partition_outside_group_is_routing_error() -> Result<()> {
    let group = group("raft", 2)?;

    assert!(group.partition(&PartitionId::new("raft", 2)).is_some(), "expected partition 2 to be found");
    let err = group.get_partition(&PartitionId::new("raft", 3)).unwrap_err();

    let app_err = err.downcast::<AppError>().context("unexpected error type")?;
    assert!(matches!(app_err, AppError::Routing(_)), "expected Routing error, got {:?}", app_err);
    Ok(())
}

#[tokio::test]
async fn directory_resolves_registered_groups() -> Result<()> {
    let directory = PartitionDirectory::new();
    directory.register(group("raft", 3)?);
    directory.register(group("data", 1)?);

    let raft = directory.get_partition_group("raft").await?;
    let data = directory.get_partition_group("data").await?;

    assert_eq!(raft.len(), 3, "unexpected raft group size");
    assert_eq!(data.len(), 1, "unexpected data group size");
    assert_eq!(directory.group_names(), vec!["data".to_string(), "raft".to_string()], "unexpected group names");
    Ok(())
}

#[tokio::test]
async fn directory_unknown_group_is_configuration_error() -> Result<()> {
    let directory = PartitionDirectory::new();
    directory.register(group("raft", 1)?);

    let err = directory.get_partition_group("missing").await.unwrap_err();

    let app_err = err.downcast::<AppError>().context("unexpected error type")?;
    assert!(matches!(app_err, AppError::Configuration(_)), "expected Configuration error, got {:?}", app_err);
    Ok(())
}
