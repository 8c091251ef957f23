//! End-to-end traversal tests
//!
//! These exercise the whole engine against the in-memory store: exact
//! result sets independent of pool size, exactly-once resolution,
//! failure policies, cancellation, deadlines, and pruning filters.

use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use znode_harvester::error::ClientResult;
use znode_harvester::store::{NodeResolution, RemoteNodeClient};
use znode_harvester::{
    ClientError, FailurePolicy, HarvestError, NodePath, ProtocolViolation, StaticTreeClient,
    TraverseConfig, TraverseCoordinator, TraverseOutcome,
};

fn config_with_pool(pool_size: usize) -> TraverseConfig {
    TraverseConfig {
        pool_size,
        ..TraverseConfig::default()
    }
}

/// Build a uniform tree: `branching` children per node, leaves at
/// `depth`. Leaf payload is the leaf's own path.
fn wide_tree(branching: usize, depth: usize) -> (StaticTreeClient, usize) {
    let mut client = StaticTreeClient::new();
    let mut leaves = 0;
    let mut frontier = vec![NodePath::root()];
    for level in 0..depth {
        let mut next = Vec::new();
        for node in frontier {
            for i in 0..branching {
                let child = node.child(&format!("n{}", i));
                if level + 1 == depth {
                    client.add_leaf(child.clone(), child.as_str());
                    leaves += 1;
                } else {
                    client.add_branch(child.clone());
                }
                next.push(child);
            }
        }
        frontier = next;
    }
    (client, leaves)
}

fn sorted_values(report: &znode_harvester::TraverseReport) -> Vec<String> {
    let mut values: Vec<String> = report.values.iter().map(|v| v.to_string_lossy()).collect();
    values.sort();
    values
}

#[tokio::test]
async fn test_single_leaf_tree() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a", "X");

    let coordinator = TraverseCoordinator::new(Arc::new(client), config_with_pool(4));
    let report = coordinator.run(vec![NodePath::new("/a")]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(sorted_values(&report), vec!["X"]);
    assert_eq!(report.leaves_collected, 1);
    assert_eq!(report.nodes_resolved, 1);
}

#[tokio::test]
async fn test_two_level_tree() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a/1", "L1");
    client.add_leaf("/a/2", "L2");

    let coordinator = TraverseCoordinator::new(Arc::new(client), config_with_pool(4));
    let report = coordinator.run(vec![NodePath::new("/a")]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(sorted_values(&report), vec!["L1", "L2"]);
    assert_eq!(report.nodes_resolved, 3); // /a, /a/1, /a/2
}

#[tokio::test]
async fn test_empty_initial_set_completes_without_calls() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a", "X");
    let client = Arc::new(client);

    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(4));
    let report = coordinator.run(Vec::new()).await.unwrap();

    assert!(report.is_complete());
    assert!(report.values.is_empty());
    assert_eq!(report.nodes_resolved, 0);
    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn test_empty_branch_is_leaf_by_absence() {
    let mut client = StaticTreeClient::new();
    client.add_branch("/empty");

    let coordinator = TraverseCoordinator::new(Arc::new(client), config_with_pool(4));
    let report = coordinator.run(vec![NodePath::new("/empty")]).await.unwrap();

    assert!(report.is_complete());
    assert!(report.values.is_empty());
}

#[tokio::test]
async fn test_multiple_roots_leave_siblings_untouched() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a/1", "A1");
    client.add_leaf("/b/1", "B1");
    client.add_leaf("/c/1", "C1");
    let client = Arc::new(client);

    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(4));
    let report = coordinator
        .run(vec![NodePath::new("/a"), NodePath::new("/b")])
        .await
        .unwrap();

    assert_eq!(sorted_values(&report), vec!["A1", "B1"]);
    assert_eq!(client.call_count(&NodePath::new("/c")), 0);
    assert_eq!(client.call_count(&NodePath::new("/c/1")), 0);
}

#[tokio::test]
async fn test_prune_policy_completes_with_empty_result() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a", "X");
    client.fail_path(
        "/a",
        ClientError::Timeout {
            path: NodePath::new("/a"),
        },
    );

    let coordinator = TraverseCoordinator::new(Arc::new(client), config_with_pool(4));
    let report = coordinator.run(vec![NodePath::new("/a")]).await.unwrap();

    assert!(report.is_complete()); // no hang
    assert!(report.values.is_empty());
    assert_eq!(report.branches_pruned, 1);
}

#[tokio::test]
async fn test_prune_policy_keeps_sibling_branches() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a/good/leaf", "G");
    client.add_leaf("/a/bad/leaf", "B");
    client.fail_path(
        "/a/bad",
        ClientError::Connection {
            path: NodePath::new("/a/bad"),
            reason: "reset".into(),
        },
    );

    let coordinator = TraverseCoordinator::new(Arc::new(client), config_with_pool(4));
    let report = coordinator.run(vec![NodePath::new("/a")]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(sorted_values(&report), vec!["G"]);
    assert_eq!(report.branches_pruned, 1);
}

#[tokio::test]
async fn test_abort_policy_surfaces_error() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a", "X");
    client.fail_path(
        "/a",
        ClientError::Timeout {
            path: NodePath::new("/a"),
        },
    );

    let config = TraverseConfig {
        failure_policy: FailurePolicy::Abort,
        ..config_with_pool(4)
    };
    let coordinator = TraverseCoordinator::new(Arc::new(client), config);
    let err = coordinator.run(vec![NodePath::new("/a")]).await.unwrap_err();

    assert!(matches!(err, HarvestError::Aborted { .. }));
}

#[tokio::test]
async fn test_per_call_timeout_prunes_stalled_branch() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/fast", "F");
    client.add_leaf("/stalled", "S");
    client.set_path_latency("/stalled", Duration::from_secs(30));

    let config = TraverseConfig {
        per_call_timeout: Duration::from_millis(50),
        ..config_with_pool(4)
    };
    let coordinator = TraverseCoordinator::new(Arc::new(client), config);
    let report = coordinator.run(vec![NodePath::root()]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(sorted_values(&report), vec!["F"]);
    assert_eq!(report.branches_pruned, 1);
}

#[tokio::test]
async fn test_cancellation_before_any_resolution() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/a/1", "X");
    let client = Arc::new(client);

    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(4));
    coordinator.shutdown_flag().store(true, Ordering::SeqCst);

    let report = coordinator.run(vec![NodePath::new("/a")]).await.unwrap();

    assert_eq!(report.outcome, TraverseOutcome::Cancelled);
    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn test_cancellation_mid_traversal_returns_partial_snapshot() {
    let (mut client, _) = wide_tree(4, 3);
    client.set_base_latency(Duration::from_millis(10));
    let client = Arc::new(client);

    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(2));
    let shutdown = coordinator.shutdown_flag();

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.store(true, Ordering::SeqCst);
    });

    let report = coordinator.run(vec![NodePath::root()]).await.unwrap();
    cancel.await.unwrap();

    assert_eq!(report.outcome, TraverseOutcome::Cancelled);
    // Partial: whatever resolved before the flag flipped stays collected
    assert!(report.leaves_collected <= 64);
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/slow", "X");
    client.set_path_latency("/slow", Duration::from_secs(30));

    let config = TraverseConfig {
        overall_timeout: Some(Duration::from_millis(100)),
        ..config_with_pool(2)
    };
    let coordinator = TraverseCoordinator::new(Arc::new(client), config);
    let report = coordinator.run(vec![NodePath::new("/slow")]).await.unwrap();

    assert_eq!(report.outcome, TraverseOutcome::DeadlineExceeded);
}

#[tokio::test]
async fn test_exclude_pattern_prunes_subtree() {
    let mut client = StaticTreeClient::new();
    client.add_leaf("/svc/db/host", "H");
    client.add_leaf("/svc/db/.lock", "LOCK");
    client.add_leaf("/svc/cache/host", "C");
    let client = Arc::new(client);

    let config = TraverseConfig {
        exclude_patterns: vec![regex::Regex::new(r"\.lock$").unwrap()],
        ..config_with_pool(4)
    };
    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config);
    let report = coordinator.run(vec![NodePath::new("/svc")]).await.unwrap();

    assert_eq!(sorted_values(&report), vec!["C", "H"]);
    assert_eq!(report.skipped, 1);
    assert_eq!(client.call_count(&NodePath::new("/svc/db/.lock")), 0);
}

#[tokio::test]
async fn test_max_depth_limits_traversal() {
    let (client, _) = wide_tree(2, 4);

    let config = TraverseConfig {
        max_depth: Some(2),
        ..config_with_pool(4)
    };
    let coordinator = TraverseCoordinator::new(Arc::new(client), config);
    let report = coordinator.run(vec![NodePath::root()]).await.unwrap();

    assert!(report.is_complete());
    // Leaves live at depth 4; everything below depth 2 was skipped
    assert_eq!(report.leaves_collected, 0);
    assert_eq!(report.nodes_resolved, 1 + 2 + 4); // root + two levels
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_result_set_identical_across_pool_sizes() {
    let mut expected: Option<Vec<String>> = None;

    for pool_size in [1usize, 4, 50] {
        let (mut client, leaves) = wide_tree(10, 3);
        client.set_hashed_latency_cap(Duration::from_millis(3));
        let client = Arc::new(client);

        let coordinator =
            TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(pool_size));
        let report = coordinator.run(vec![NodePath::root()]).await.unwrap();

        assert!(report.is_complete(), "pool_size={}", pool_size);
        assert_eq!(report.leaves_collected as usize, leaves);
        assert!(
            client.peak_concurrency() <= pool_size,
            "pool_size={} exceeded: {}",
            pool_size,
            client.peak_concurrency()
        );
        assert!(
            client.duplicate_calls().is_empty(),
            "paths resolved twice under pool_size={}",
            pool_size
        );

        let values = sorted_values(&report);
        match &expected {
            Some(expected) => assert_eq!(&values, expected, "pool_size={}", pool_size),
            None => expected = Some(values),
        }
    }
}

#[tokio::test]
async fn test_every_path_resolved_exactly_once() {
    let (client, leaves) = wide_tree(5, 2);
    let client = Arc::new(client);

    let coordinator = TraverseCoordinator::new(Arc::clone(&client) as _, config_with_pool(8));
    let report = coordinator.run(vec![NodePath::root()]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.leaves_collected as usize, leaves);
    // Root + 5 branches + 25 leaves, each resolved exactly once
    assert_eq!(client.total_calls(), 31);
    assert!(client.duplicate_calls().is_empty());
}

/// A store whose tree is not a tree: two internal nodes share a child.
struct DiamondClient;

#[async_trait]
impl RemoteNodeClient for DiamondClient {
    async fn resolve(&self, path: &NodePath) -> ClientResult<NodeResolution> {
        match path.as_str() {
            "/a" | "/b" => Ok(NodeResolution::Children(vec![NodePath::new("/shared")])),
            "/shared" => Ok(NodeResolution::Leaf("X".into())),
            _ => Err(ClientError::NotFound { path: path.clone() }),
        }
    }
}

#[tokio::test]
async fn test_shared_child_is_a_fatal_protocol_violation() {
    let coordinator = TraverseCoordinator::new(Arc::new(DiamondClient), config_with_pool(1));
    let err = coordinator
        .run(vec![NodePath::new("/a"), NodePath::new("/b")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarvestError::Protocol(ProtocolViolation::DuplicateDispatch { .. })
    ));
}
