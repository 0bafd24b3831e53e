use anyhow::{Context, Result};

use crate::error::AppError;
use crate::fixtures::{self, FixtureProtocol};
use crate::primitive::{PrimitiveType, ServiceConfig};
use crate::session::PrimitiveOperation;

#[tokio::test]
async fn connect_returns_session_bound_to_partition() -> Result<()> {
    let partition = fixtures::partition("raft", 2, &["a", "b"], FixtureProtocol::Accept)?;
    partition.publish_primary(4, Some("b".into()))?;

    let session = partition
        .session_builder("counter", PrimitiveType::new("atomic-counter"), ServiceConfig::default())
        .connect()
        .await?;
    let output = session.execute(PrimitiveOperation::new("echo", b"ping".to_vec())).await?;

    assert_eq!(session.partition_id(), partition.id(), "expected session to be bound to the partition");
    assert_eq!(session.term(), 4, "expected session to observe the partition term");
    assert_eq!(output, b"ping".to_vec(), "unexpected operation output");
    session.close().await
}

#[tokio::test]
async fn connect_transport_failure_is_connection_error() -> Result<()> {
    let partition = fixtures::partition("raft", 1, &["a"], FixtureProtocol::Unreachable)?;

    let res = partition
        .session_builder("counter", PrimitiveType::new("atomic-counter"), ServiceConfig::default())
        .connect()
        .await;

    let app_err = res.err().context("expected connect to fail")?.downcast::<AppError>().context("unexpected error type")?;
    assert!(matches!(app_err, AppError::Connection(_)), "expected Connection error, got {:?}", app_err);
    Ok(())
}

#[tokio::test]
async fn connect_app_errors_pass_through() -> Result<()> {
    let partition = fixtures::partition("raft", 1, &["a"], FixtureProtocol::Misconfigured)?;

    let res = partition
        .session_builder("counter", PrimitiveType::new("atomic-counter"), ServiceConfig::default())
        .connect()
        .await;

    let app_err = res.err().context("expected connect to fail")?.downcast::<AppError>().context("unexpected error type")?;
    assert!(matches!(app_err, AppError::Configuration(_)), "expected Configuration error, got {:?}", app_err);
    Ok(())
}
