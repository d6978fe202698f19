// ── Connection lifecycle ──────────────────────────────────────────────────────

use std::time::Duration;

use iris_services::KeepAlivePolicy;

use crate::*;

/// A close from a superseded connection must not evict its replacement.
#[tokio::test]
async fn test_stale_close_leaves_replacement() -> Result<()> {
    let mut node = Node::start();
    let p = peer(9);

    let old = node.connect(&p, FakeConnection::healthy(), false).await?;
    let new = node.connect(&p, FakeConnection::healthy(), false).await?;
    node.close(old).await?;

    assert_eq!(node.next_line().await?, format!("INFO: Connection 0 closed, peer id: {p}"));
    node.settle(new).await?;
    assert_eq!(node.registry.sequence_of(&p), Some(1));

    node.close(new).await?;
    assert_eq!(node.next_line().await?, format!("INFO: Connection 1 closed, peer id: {p}"));

    // Closing the live connection empties the registry.
    let barrier = node.connect(&peer(10), FakeConnection::healthy(), false).await?;
    node.settle(barrier).await?;
    assert_eq!(node.registry.sequence_of(&p), None);
    assert_eq!(node.registry.snapshot_size(), 1);
    Ok(())
}

/// Keep-alive is requested once on connections we dialled, never on
/// connections the remote dialled.
#[tokio::test]
async fn test_keep_alive_only_for_initiator() -> Result<()> {
    let mut node = Node::start();
    let inbound = FakeConnection::healthy();
    let outbound = FakeConnection::healthy();

    node.connect(&peer(1), inbound.clone(), false).await?;
    let last = node.connect(&peer(2), outbound.clone(), true).await?;
    node.settle(last).await?;

    assert!(inbound.keep_alive_calls().is_empty());
    assert_eq!(
        outbound.keep_alive_calls(),
        vec![(true, KeepAlivePolicy::DEFAULT_INTERVAL)]
    );
    assert_eq!(KeepAlivePolicy::DEFAULT_INTERVAL, Duration::from_millis(600));
    Ok(())
}

/// Incoming bytes are printed tagged with the sender, invalid UTF-8
/// replaced rather than dropped.
#[tokio::test]
async fn test_data_is_tagged_with_sender() -> Result<()> {
    let mut node = Node::start();
    let p = peer(4);
    let id = node.connect(&p, FakeConnection::healthy(), false).await?;

    node.data(id, b"hi there").await?;
    assert_eq!(node.next_line().await?, format!("INFO: From: {p} - hi there"));

    node.data(id, b"bad \xff byte").await?;
    assert_eq!(node.next_line().await?, format!("INFO: From: {p} - bad \u{fffd} byte"));
    Ok(())
}

/// `on_close` reports whether the registry entry went away: false for a
/// superseded connection, true for the current one.
#[tokio::test]
async fn test_close_reports_removed_or_left_intact() -> Result<()> {
    let registry = PeerRegistry::new();
    let (sink, mut output) = ChannelSink::new();
    let handler =
        ConnectionHandler::new(registry.clone(), Arc::new(sink), KeepAlivePolicy::default());
    let p = peer(5);
    let info = ConnectionInfo {
        identity: p.clone(),
        initiator: false,
    };

    let old = handler.accept(FakeConnection::healthy(), info.clone());
    let new = handler.accept(FakeConnection::healthy(), info);

    assert!(!handler.on_close(old), "superseded close must leave the entry intact");
    assert_eq!(registry.sequence_of(&p), Some(new.sequence()));

    let live_sequence = new.sequence();
    assert!(handler.on_close(new), "close of the current connection removes it");
    assert!(registry.is_empty());

    // Both closes are still announced to the operator.
    let first = output.try_recv().context("first close line")?;
    let second = output.try_recv().context("second close line")?;
    assert_eq!(first.to_string(), format!("INFO: Connection 0 closed, peer id: {p}"));
    assert_eq!(
        second.to_string(),
        format!("INFO: Connection {live_sequence} closed, peer id: {p}")
    );
    Ok(())
}
