mod common;
use common::{next_port, start_node};

#[tokio::test]
async fn new_node_can_join_after_a_peer_has_died() {
    let (node1, _s1) = start_node(next_port()).await;
    let (node2, s2) = start_node(next_port()).await;
    let (node3, _s3) = start_node(next_port()).await;

    node2.join(node1.info()).await.expect("node2 failed to join");
    node3.join(node1.info()).await.expect("node3 failed to join");

    let nodes = vec![node1.clone(), node2.clone(), node3.clone()];
    common::stabilize_ring(&nodes, 8).await;

    s2.cancel();
    node2.stop();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let survivors = vec![node1.clone(), node3.clone()];
    common::stabilize_ring(&survivors, 8).await;

    let (node4, _s4) = start_node(next_port()).await;
    node4
        .join(node1.info())
        .await
        .expect("node4 should still be able to join through a live bootstrap peer");
}
