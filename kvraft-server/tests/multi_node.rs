//! Multi-node cluster tests.

mod common;

use common::{eventually, TestCluster};
use kvraft_core::envelope;
use kvraft_server::{ConsensusEngine, Operation, SubmitError, SUBMIT_TIMEOUT};
use tonic::Code;

/// Test that a 3-node cluster elects one leader every node agrees on.
#[tokio::test]
async fn test_multi_node_leader_election() {
    let mut cluster = TestCluster::new(3).await;

    let leader = cluster
        .wait_for_leader(5000)
        .await
        .expect("Should elect a leader");
    assert!((1..=3).contains(&leader));

    for (i, node) in cluster.nodes.iter().enumerate() {
        let metrics = node.metrics();
        let voters = metrics.membership_config.voter_ids().count();
        assert_eq!(voters, 3, "Node {} should see 3 voters", i + 1);
    }

    cluster.shutdown().await;
}

/// Test that a put on the leader reaches every replica.
#[tokio::test]
async fn test_multi_node_replication() {
    let mut cluster = TestCluster::new(3).await;
    let leader = cluster.wait_for_leader(5000).await.expect("No leader");

    let mut client = cluster.connect(leader).await;
    let response = client
        .put(envelope::request("city", "lisbon", 1, 1))
        .await
        .expect("Put failed")
        .into_inner();
    assert_eq!(response.value, "lisbon");

    for (i, node) in cluster.nodes.iter().enumerate() {
        let store = node.store().clone();
        let replicated = eventually(3000, || store.get("city") == "lisbon").await;
        assert!(replicated, "Node {} should apply the put", i + 1);
    }

    cluster.shutdown().await;
}

/// Test that followers reject requests instead of forwarding them.
#[tokio::test]
async fn test_multi_node_follower_rejects() {
    let mut cluster = TestCluster::new(3).await;
    let leader = cluster.wait_for_leader(5000).await.expect("No leader");
    let follower = (1..=3).find(|id| *id != leader).expect("No follower");

    let mut client = cluster.connect(follower).await;

    let status = client
        .put(envelope::request("k", "v", 1, 1))
        .await
        .expect_err("Follower should reject put");
    assert_eq!(status.code(), Code::FailedPrecondition);

    let status = client
        .get(envelope::request("k", "", 1, 2))
        .await
        .expect_err("Follower should reject get");
    assert_eq!(status.code(), Code::FailedPrecondition);

    assert_eq!(cluster.nodes[cluster.index_of(follower)].store().get("k"), "");

    cluster.shutdown().await;
}

/// Test that a retried envelope is applied once on every replica.
#[tokio::test]
async fn test_multi_node_duplicate_applied_once() {
    let mut cluster = TestCluster::new(3).await;
    let leader = cluster.wait_for_leader(5000).await.expect("No leader");
    let mut client = cluster.connect(leader).await;

    let first = client
        .put(envelope::request("x", "1", 9, 1))
        .await
        .expect("Put failed")
        .into_inner();
    assert_eq!(first.value, "1");

    // Same client and sequence number, different value: the cached result wins.
    let retry = client
        .put(envelope::request("x", "2", 9, 1))
        .await
        .expect("Put failed")
        .into_inner();
    assert_eq!(retry.value, "1");

    let next = client
        .put(envelope::request("x", "3", 9, 2))
        .await
        .expect("Put failed")
        .into_inner();
    assert_eq!(next.value, "3");

    for (i, node) in cluster.nodes.iter().enumerate() {
        let store = node.store().clone();
        let converged = eventually(3000, || {
            store.get("x") == "3" && store.session(9).map(|s| s.sequence_number) == Some(2)
        })
        .await;
        assert!(converged, "Node {} should converge", i + 1);
    }

    cluster.shutdown().await;
}

/// Test the engine outcome on a follower, below the gRPC layer.
#[tokio::test]
async fn test_multi_node_follower_engine_reports_leader() {
    let mut cluster = TestCluster::new(3).await;
    let leader = cluster.wait_for_leader(5000).await.expect("No leader");
    let follower = (1..=3).find(|id| *id != leader).expect("No follower");

    let engine = cluster.nodes[cluster.index_of(follower)].engine();
    let write = Operation::replicated(&envelope::request("k", "v", 3, 1));
    let read = Operation::read_only(&envelope::request("k", "", 3, 2));

    assert_eq!(
        engine.submit(write, SUBMIT_TIMEOUT).await,
        Err(SubmitError::NotLeader {
            leader: Some(leader)
        })
    );
    assert_eq!(
        engine.submit(read, SUBMIT_TIMEOUT).await,
        Err(SubmitError::NotLeader {
            leader: Some(leader)
        })
    );

    cluster.shutdown().await;
}
