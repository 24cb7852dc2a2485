mod common;
use chord_core::{in_arc, Id};
use common::start_node;

#[tokio::test]
async fn key_migrates_on_join_and_back_on_leave() {
    let port_a = 25100;
    let (node_a, _shutdown_a) = start_node(port_a).await;

    let key = "test_key";
    let key_id = Id::hash(key);

    assert!(node_a.store(key.to_string(), "value1".to_string()).await);
    assert_eq!(node_a.get(key.to_string()).await, Some("value1".to_string()));
    assert_eq!(node_a.handle_get_key(key).await, Some("value1".to_string()));

    // Find a port whose id lands the key in (A, B], so joining B pulls the
    // key away from A.
    let mut chosen = None;
    for port_b in 25101..25200 {
        let candidate_id = Id::hash(format!("127.0.0.1:{port_b}"));
        if in_arc(node_a.id, key_id, candidate_id, true) {
            chosen = Some(port_b);
            break;
        }
    }
    let port_b = chosen.expect("no candidate port found in range");

    let (node_b, _shutdown_b) = start_node(port_b).await;
    node_b.join(node_a.info()).await.expect("node_b failed to join");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    assert_eq!(node_b.handle_get_key(key).await, Some("value1".to_string()), "node B should have acquired the key");
    assert_eq!(node_a.handle_get_key(key).await, None, "node A should no longer hold the key locally");

    node_b.leave().await;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert_eq!(node_a.handle_get_key(key).await, Some("value1".to_string()), "node A should have the key back after B leaves");
}
