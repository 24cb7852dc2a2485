mod common;
use common::{next_port, start_node};

#[tokio::test]
async fn replicated_key_survives_primary_failure() {
    const NUM_NODES: usize = 3;

    let mut nodes = Vec::new();
    let mut shutdowns = Vec::new();
    for _ in 0..NUM_NODES {
        let (node, shutdown) = start_node(next_port()).await;
        nodes.push(node);
        shutdowns.push(shutdown);
    }

    for node in &nodes[1..] {
        node.join(nodes[0].info()).await.expect("join failed");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    common::stabilize_ring(&nodes, 10).await;

    let key = "replication_key";
    let value = "replication_value";
    assert!(nodes[0].store(key.to_string(), value.to_string()).await);

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    // With replication_factor=3 and 3 nodes, every node should hold a copy.
    for (i, node) in nodes.iter().enumerate() {
        let value_here = node.handle_get_key(key).await;
        assert_eq!(value_here.as_deref(), Some(value), "node {i} missing replica");
    }

    // Kill node 0 and confirm the key is still reachable through a survivor.
    shutdowns[0].cancel();
    nodes[0].stop();

    let survivors = &nodes[1..];
    common::stabilize_ring(survivors, 10).await;

    let recovered = survivors[0].get(key.to_string()).await;
    assert_eq!(recovered, Some(value.to_string()));
}
