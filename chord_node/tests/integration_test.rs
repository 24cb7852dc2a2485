mod common;
use chord_core::Id;
use common::{next_port, start_node};

#[tokio::test]
async fn ring_formation_and_routing() {
    let port1 = next_port();
    let port2 = next_port();
    let port3 = next_port();

    let (node1, _s1) = start_node(port1).await;
    let (node2, _s2) = start_node(port2).await;
    let (node3, _s3) = start_node(port3).await;

    node2.join(node1.info()).await.expect("node2 failed to join");
    node3.join(node1.info()).await.expect("node3 failed to join");

    let nodes = vec![node1.clone(), node2.clone(), node3.clone()];
    common::stabilize_ring(&nodes, 15).await;

    let key = "test_key";
    let value = "test_value";

    assert!(node1.store(key.to_string(), value.to_string()).await);

    let got = node3.get(key.to_string()).await;
    assert_eq!(got, Some(value.to_string()));

    // The ring should have 3 distinct nodes, walkable successor to successor.
    let mut visited = std::collections::HashSet::new();
    let mut current = node1.id;
    for _ in 0..nodes.len() {
        visited.insert(current);
        let owner = nodes.iter().find(|n| n.id == current).unwrap();
        let successor = owner.handle_get_successor().await.unwrap();
        current = successor.id;
    }
    assert_eq!(current, node1.id, "ring did not close");
    assert_eq!(visited.len(), 3);

    // find_successor from every node should agree on who owns the key.
    let key_hash = Id::hash(key);
    let owner_from_1 = node1.handle_find_successor(key_hash, 0).await.unwrap();
    let owner_from_2 = node2.handle_find_successor(key_hash, 0).await.unwrap();
    let owner_from_3 = node3.handle_find_successor(key_hash, 0).await.unwrap();
    assert_eq!(owner_from_1.id, owner_from_2.id);
    assert_eq!(owner_from_2.id, owner_from_3.id);
}
