// ── Broadcast ─────────────────────────────────────────────────────────────────

use iris_services::BroadcastDispatcher;

use crate::*;

/// Local identity is 32 bytes; three connected peers each get one copy.
#[tokio::test]
async fn test_three_peers_receive_one_write_each() -> Result<()> {
    let local = PeerIdentity::generate();
    assert_eq!(local.as_bytes().len(), 32);
    assert_eq!(local.to_hex().len(), 64);

    let mut node = Node::start();
    let conns: Vec<_> = (0..3).map(|_| FakeConnection::healthy()).collect();
    let mut last = None;
    for (i, c) in conns.iter().enumerate() {
        last = Some(node.connect(&peer(i as u8 + 1), c.clone(), false).await?);
    }
    node.settle(last.context("no connections")?).await?;
    assert_eq!(node.registry.snapshot_size(), 3);

    assert!(BroadcastDispatcher::new(node.registry.clone()).dispatch("hello"));

    for c in &conns {
        assert_eq!(c.writes(), vec![Bytes::from_static(b"hello")]);
    }
    Ok(())
}

/// A peer whose writes fail does not stop the others from receiving.
#[tokio::test]
async fn test_failed_write_is_isolated() -> Result<()> {
    let mut node = Node::start();
    let first = FakeConnection::healthy();
    let second = FakeConnection::broken();
    let third = FakeConnection::healthy();

    node.connect(&peer(1), first.clone(), false).await?;
    node.connect(&peer(2), second.clone(), false).await?;
    let last = node.connect(&peer(3), third.clone(), false).await?;
    node.settle(last).await?;

    BroadcastDispatcher::new(node.registry.clone()).dispatch("still here");

    assert_eq!(first.writes(), vec![Bytes::from_static(b"still here")]);
    assert!(second.writes().is_empty());
    assert_eq!(third.writes(), vec![Bytes::from_static(b"still here")]);
    // The failing peer stays registered; only its transport closing removes it.
    assert_eq!(node.registry.snapshot_size(), 3);
    Ok(())
}

/// Once a peer reconnects, broadcasts go only to the newest connection.
#[tokio::test]
async fn test_broadcast_targets_current_connection() -> Result<()> {
    let mut node = Node::start();
    let old = FakeConnection::healthy();
    let new = FakeConnection::healthy();

    node.connect(&peer(7), old.clone(), false).await?;
    let current = node.connect(&peer(7), new.clone(), false).await?;
    node.settle(current).await?;

    BroadcastDispatcher::new(node.registry.clone()).dispatch("latest");

    assert!(old.writes().is_empty());
    assert_eq!(new.writes(), vec![Bytes::from_static(b"latest")]);
    Ok(())
}
