//! Independent ping-based failure detection for the successor and
//! predecessor. Separate from `stabilize`/`check_predecessor` (which
//! repair topology on their own slower cadence): this runs on the
//! tighter `ping_interval` and only acts once a peer has missed
//! `failure_threshold` consecutive pings, so one dropped packet doesn't
//! trigger a ring repair. Successor recovery is spawned as its own task
//! rather than awaited here, so a slow recovery walk (pinging every
//! successor-list entry, then every finger) never stalls this loop's own
//! predecessor check or its next tick.

use crate::node::Node;
use std::sync::Arc;
use tokio::time::timeout;

pub struct FailureDetector {
    node: Arc<Node>,
    successor_failures: u32,
    predecessor_failures: u32,
}

impl FailureDetector {
    pub fn new(node: Arc<Node>) -> Self {
        FailureDetector {
            node,
            successor_failures: 0,
            predecessor_failures: 0,
        }
    }

    pub async fn tick(&mut self) {
        if !self.node.running() {
            return;
        }
        self.check_successor().await;
        self.check_predecessor().await;
    }

    async fn check_successor(&mut self) {
        let successor = match self.node.handle_get_successor().await {
            Ok(s) => s,
            Err(_) => return,
        };
        if successor.id == self.node.id {
            self.successor_failures = 0;
            return;
        }
        let client = self.node.client_for(successor);
        let alive = timeout(self.node.config.ping_timeout, client.ping())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
        if alive {
            if self.successor_failures > 0 {
                log::info!("successor {} back online", successor.id);
            }
            self.successor_failures = 0;
        } else {
            self.successor_failures += 1;
            log::warn!(
                "successor {} not responding (attempt {}/{})",
                successor.id,
                self.successor_failures,
                self.node.config.failure_threshold
            );
            if self.successor_failures >= self.node.config.failure_threshold {
                log::error!("successor {} declared dead", successor.id);
                self.successor_failures = 0;
                let node = self.node.clone();
                tokio::spawn(async move { node.handle_successor_failure().await });
            }
        }
    }

    async fn check_predecessor(&mut self) {
        let predecessor = match self.node.handle_get_predecessor().await {
            Some(p) => p,
            None => {
                self.predecessor_failures = 0;
                return;
            }
        };
        let client = self.node.client_for(predecessor);
        let alive = timeout(self.node.config.ping_timeout, client.ping())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
        if alive {
            if self.predecessor_failures > 0 {
                log::info!("predecessor {} back online", predecessor.id);
            }
            self.predecessor_failures = 0;
        } else {
            self.predecessor_failures += 1;
            log::warn!(
                "predecessor {} not responding (attempt {}/{})",
                predecessor.id,
                self.predecessor_failures,
                self.node.config.failure_threshold
            );
            if self.predecessor_failures >= self.node.config.failure_threshold {
                log::error!("predecessor {} declared dead", predecessor.id);
                self.predecessor_failures = 0;
                self.node.clear_predecessor().await;
            }
        }
    }
}
