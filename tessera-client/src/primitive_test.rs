use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::prelude::*;

use crate::config::DEFAULT_PARTITION_GROUP;
use crate::counter::{ATOMIC_COUNTER, OP_ADD_AND_GET};
use crate::fixtures::{harness, stalled_client};
use crate::primitive::PrimitiveTypeRegistry;
use crate::proto::{CounterAddRequest, CounterValue};
use crate::utils;
use tessera_core::{AppError, PartitionService, Partitioner, PrimitiveId, PrimitiveOperation, PrimitiveType, ServiceConfig};

fn counter_id(name: &str) -> PrimitiveId {
    PrimitiveId::new(name, PrimitiveType::new(ATOMIC_COUNTER))
}

#[test]
fn registry_knows_builtin_types() -> Result<()> {
    let registry = PrimitiveTypeRegistry::default();
    registry.ensure(&PrimitiveType::new(ATOMIC_COUNTER))?;

    let err = registry
        .ensure(&PrimitiveType::new("work-queue"))
        .err()
        .context("expected an unknown type to be rejected")?;
    assert!(
        matches!(err.downcast_ref::<AppError>(), Some(AppError::Configuration(_))),
        "expected AppError::Configuration, got {:?}",
        err
    );
    Ok(())
}

#[tokio::test]
async fn unknown_primitive_type_is_rejected_before_any_resources_are_created() -> Result<()> {
    let harness = harness(3)?;
    let id = PrimitiveId::new("queue", PrimitiveType::new("work-queue"));

    let err = harness
        .client
        .connect_primitive(id, DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await
        .err()
        .context("expected unknown primitive type to be rejected")?;
    assert!(
        matches!(err.downcast_ref::<AppError>(), Some(AppError::Configuration(_))),
        "expected AppError::Configuration, got {:?}",
        err
    );
    assert_eq!(harness.contexts.active_contexts(), 0, "expected no execution context to be created");

    Ok(())
}

#[tokio::test]
async fn unknown_or_empty_group_is_a_configuration_error() -> Result<()> {
    let harness = harness(3)?;
    harness.local.add_group("empty", 0, &["node-1"])?;

    for group in ["missing", "empty"] {
        let err = harness
            .client
            .connect_primitive(counter_id("hits"), group, ServiceConfig::default())
            .await
            .err()
            .with_context(|| format!("expected group {} to be rejected", group))?;
        assert!(
            matches!(err.downcast_ref::<AppError>(), Some(AppError::Configuration(_))),
            "expected AppError::Configuration for group {}, got {:?}",
            group,
            err
        );
    }
    assert_eq!(harness.contexts.active_contexts(), 0, "expected no execution context to be created");

    Ok(())
}

#[tokio::test]
async fn primitives_are_bound_to_the_partition_selected_for_their_name() -> Result<()> {
    let harness = harness(5)?;
    let group = harness.local.get_partition_group(DEFAULT_PARTITION_GROUP).await?;
    let ids = group.partition_ids();

    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let len = rng.gen_range(1..24);
        let name: String = (&mut rng).sample_iter(&Alphanumeric).take(len).map(char::from).collect();
        let expected = Partitioner.partition(&name, &ids)?;

        let first = harness.client.connect_primitive(counter_id(&name), DEFAULT_PARTITION_GROUP, ServiceConfig::default()).await?;
        let second = harness.client.connect_primitive(counter_id(&name), DEFAULT_PARTITION_GROUP, ServiceConfig::default()).await?;
        assert_eq!(first.partition_id(), &expected, "expected primitive {} on partition {}", name, expected);
        assert_eq!(second.partition_id(), first.partition_id(), "expected primitive {} to be routed stably", name);
        assert_ne!(first.context().id(), second.context().id(), "expected each primitive to own an execution context");

        first.close().await?;
        second.close().await?;
    }
    assert_eq!(harness.contexts.active_contexts(), 0, "expected all execution contexts to be released on close");

    Ok(())
}

#[tokio::test]
async fn connect_failure_releases_the_execution_context() -> Result<()> {
    let harness = harness(3)?;
    let group = harness.local.get_partition_group(DEFAULT_PARTITION_GROUP).await?;
    let partition = Partitioner.partition("hits", &group.partition_ids())?;
    harness.local.elect(&partition, 2, None)?;

    let err = harness
        .client
        .connect_primitive(counter_id("hits"), DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await
        .err()
        .context("expected connect without a primary to fail")?;
    assert!(
        matches!(err.downcast_ref::<AppError>(), Some(AppError::Connection(_))),
        "expected AppError::Connection, got {:?}",
        err
    );
    assert_eq!(harness.contexts.active_contexts(), 0, "expected the execution context to be closed after connect failure");

    harness.local.elect(&partition, 3, Some("node-3"))?;
    let proxy = harness
        .client
        .connect_primitive(counter_id("hits"), DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await?;
    assert_eq!(proxy.term(), 3, "expected the new session to observe the new term");
    assert_eq!(harness.contexts.active_contexts(), 1, "expected one live execution context");
    proxy.close().await?;

    Ok(())
}

#[tokio::test]
async fn raw_operations_are_delivered_in_issue_order() -> Result<()> {
    let harness = harness(3)?;
    let proxy = harness
        .client
        .connect_primitive(counter_id("hits"), DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await?;

    let mut pending = Vec::new();
    for _ in 0..50 {
        let payload = utils::encode_model(&CounterAddRequest { delta: 1 })?;
        pending.push(proxy.execute(PrimitiveOperation::new(OP_ADD_AND_GET, payload)));
    }
    let outputs = futures::future::try_join_all(pending).await?;
    let values = outputs
        .iter()
        .map(|output| utils::decode_model::<CounterValue>(output).map(|val| val.value))
        .collect::<Result<Vec<_>>>()?;
    let expected: Vec<i64> = (1..=50).collect();
    assert_eq!(values, expected, "expected operations to be applied and delivered in issue order");

    let session = proxy.session_id();
    let server = harness.local.server(proxy.partition_id()).context("expected partition to be hosted")?;
    assert_eq!(server.session_count()?, 1, "expected session {} to be open", session);
    proxy.close().await?;
    assert_eq!(server.session_count()?, 0, "expected session {} to be closed with its primitive", session);
    assert!(proxy.context().is_closed(), "expected execution context to be closed with its primitive");

    Ok(())
}

#[tokio::test]
async fn abandoned_build_releases_the_execution_context() -> Result<()> {
    let (client, contexts) = stalled_client()?;

    let build = client.atomic_counter_builder("hits").build_async();
    let res = tokio::time::timeout(std::time::Duration::from_millis(50), build).await;
    assert!(res.is_err(), "expected the build to stall on a handshake which never completes");

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while contexts.active_contexts() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(contexts.active_contexts(), 0, "expected the execution context of an abandoned build to be released");

    Ok(())
}

#[tokio::test]
async fn close_is_idempotent() -> Result<()> {
    let harness = harness(3)?;
    let proxy = harness
        .client
        .connect_primitive(counter_id("hits"), DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await?;

    proxy.close().await?;
    proxy.close().await?;
    assert!(proxy.context().is_closed(), "expected execution context to stay closed");
    assert_eq!(harness.contexts.active_contexts(), 0, "expected the execution context to be released once");

    Ok(())
}

#[tokio::test]
async fn operations_on_a_closed_primitive_are_not_issued() -> Result<()> {
    let harness = harness(3)?;
    let proxy = harness
        .client
        .connect_primitive(counter_id("hits"), DEFAULT_PARTITION_GROUP, ServiceConfig::default())
        .await?;
    let server = harness.local.server(proxy.partition_id()).context("expected partition to be hosted")?;
    proxy.close().await?;
    let index = server.index()?;

    let payload = utils::encode_model(&CounterAddRequest { delta: 1 })?;
    let err = proxy
        .execute(PrimitiveOperation::new(OP_ADD_AND_GET, payload))
        .await
        .err()
        .context("expected execute after close to fail")?;
    assert!(
        matches!(err.downcast_ref::<AppError>(), Some(AppError::Closed)),
        "expected AppError::Closed, got {:?}",
        err
    );
    assert_eq!(server.index()?, index, "expected no operation to reach the partition after close");

    Ok(())
}
