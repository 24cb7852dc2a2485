use chord_node::config::{ChordConfig, LOCALHOST};
use chord_node::server::Server;
use chord_node::Node;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static NEXT_PORT: AtomicU16 = AtomicU16::new(23000);

#[allow(dead_code)]
pub fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// Starts one node with its TCP server on a background task and returns
/// it along with the cancellation token that stops it.
pub async fn start_node(port: u16) -> (Arc<Node>, CancellationToken) {
    start_node_with_config(port, ChordConfig::default()).await
}

pub async fn start_node_with_config(port: u16, config: ChordConfig) -> (Arc<Node>, CancellationToken) {
    let node = Node::new(LOCALHOST, port, config);
    let shutdown = CancellationToken::new();
    let server = Server::new(node.clone());
    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(token).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    (node, shutdown)
}

#[allow(dead_code)]
pub async fn stabilize_ring(nodes: &[Arc<Node>], rounds: usize) {
    for _ in 0..rounds {
        for node in nodes {
            node.stabilize().await;
            node.fix_fingers().await;
            node.check_predecessor().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
