mod common;
use common::{next_port, start_node};

#[tokio::test]
async fn large_ring_routes_and_distributes_keys() {
    const NUM_NODES: usize = 12;

    let mut nodes = Vec::new();
    for i in 0..NUM_NODES {
        let (node, _shutdown) = start_node(next_port()).await;
        nodes.push(node);
        if i % 3 == 2 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    for node in &nodes[1..] {
        node.join(nodes[0].info()).await.expect("join failed");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    common::stabilize_ring(&nodes, 25).await;

    // Ring should close after NUM_NODES hops through successor pointers.
    let mut visited = std::collections::HashSet::new();
    let mut current = nodes[0].id;
    for _ in 0..NUM_NODES {
        visited.insert(current);
        let owner = nodes.iter().find(|n| n.id == current).unwrap();
        current = owner.handle_get_successor().await.unwrap().id;
    }
    assert_eq!(current, nodes[0].id, "ring is not properly formed");
    assert_eq!(visited.len(), NUM_NODES, "not all nodes reachable via successor pointers");

    let test_cases = [
        ("key1", "value1"),
        ("key2", "value2"),
        ("key3", "value3"),
        ("hello", "world"),
        ("foo", "bar"),
        ("chord", "dht"),
    ];

    for (i, (key, value)) in test_cases.iter().enumerate() {
        let put_node = &nodes[i % NUM_NODES];
        assert!(put_node.store(key.to_string(), value.to_string()).await, "store failed for {key}");
    }

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    for (i, (key, expected)) in test_cases.iter().enumerate() {
        let get_node = &nodes[(i + NUM_NODES / 2) % NUM_NODES];
        let got = get_node.get(key.to_string()).await;
        assert_eq!(got.as_deref(), Some(*expected), "get mismatch for {key}");
    }

    let mut total_keys = 0;
    for node in &nodes {
        total_keys += node.handle_get_status().await.keys_count;
    }
    // Every key is stored at its primary plus up to replication_factor-1 replicas.
    assert!(total_keys >= test_cases.len());
}
