use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::prelude::*;

use crate::error::AppError;
use crate::partition::PartitionId;
use crate::partitioner::Partitioner;

fn ids(group: &str, count: u32) -> Vec<PartitionId> {
    (1..=count).map(|id| PartitionId::new(group, id)).collect()
}

fn random_name() -> String {
    let len = rand::thread_rng().gen_range(1..32);
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

#[test]
fn partition_is_deterministic_for_equal_id_lists() -> Result<()> {
    for _ in 0..100 {
        let name = random_name();
        let (first, second) = (ids("raft", 7), ids("raft", 7));

        let a = Partitioner.partition(&name, &first)?;
        let b = Partitioner.partition(&name, &first)?;
        let c = Partitioner::default().partition(&name, &second)?;

        assert_eq!(a, b, "expected repeated calls for {} to select the same partition", name);
        assert_eq!(a, c, "expected equal id lists for {} to select the same partition", name);
    }
    Ok(())
}

#[test]
fn partition_is_always_a_member_of_the_id_list() -> Result<()> {
    for count in 1..=16 {
        let ids = ids("raft", count);
        for _ in 0..32 {
            let name = random_name();
            let selected = Partitioner.partition(&name, &ids)?;
            assert!(ids.contains(&selected), "partition {} selected for {} is not one of {:?}", selected, name, ids);
        }
    }
    Ok(())
}

#[test]
fn partition_spreads_names_across_partitions() -> Result<()> {
    let ids = ids("raft", 3);
    let mut selected = BTreeSet::new();
    for offset in 0..1_000 {
        selected.insert(Partitioner.partition(&format!("counter-{}", offset), &ids)?);
    }

    assert_eq!(selected.len(), ids.len(), "expected every partition to own at least one name, got {:?}", selected);
    Ok(())
}

#[test]
fn single_partition_always_selected() -> Result<()> {
    let ids = ids("raft", 1);

    let selected = Partitioner.partition(&random_name(), &ids)?;

    assert_eq!(selected, ids[0], "expected the only partition to be selected");
    Ok(())
}

#[test]
fn empty_id_list_is_a_configuration_error() -> Result<()> {
    let err = Partitioner.partition("counter", &[]).unwrap_err();

    let app_err = err.downcast::<AppError>().context("unexpected error type")?;
    assert!(matches!(app_err, AppError::Configuration(_)), "expected Configuration error, got {:?}", app_err);
    Ok(())
}
