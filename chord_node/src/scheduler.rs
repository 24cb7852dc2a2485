//! The periodic maintenance loop: stabilize, fix_fingers and
//! check_predecessor each on their own jittered cadence, plus the
//! failure detector's tighter ping loop and a slow status line for
//! operators tailing logs. All run as independent tokio tasks under one
//! `CancellationToken` so `leave`/shutdown can stop them together.

use crate::failure_detector::FailureDetector;
use crate::node::Node;
use chord_core::wire::{request_type, write_message, ChordMessage};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(10);
const MONITOR_REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub fn spawn_all(node: Arc<Node>, shutdown: CancellationToken) {
    spawn_stabilize(node.clone(), shutdown.clone());
    spawn_fix_fingers(node.clone(), shutdown.clone());
    spawn_check_predecessor(node.clone(), shutdown.clone());
    spawn_failure_detector(node.clone(), shutdown.clone());
    spawn_status_log(node, shutdown);
}

/// Periodically pushes this node's `GET_STATUS` snapshot to a
/// `chord-monitor` instance, fire-and-forget: a monitor that's down or
/// unreachable never blocks or slows the node's own maintenance tasks.
pub fn spawn_monitor_report(node: Arc<Node>, shutdown: CancellationToken, monitor: SocketAddr) {
    tokio::spawn(async move {
        while node.running() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(MONITOR_REPORT_INTERVAL) => {}
            }
            let status = node.handle_get_status().await;
            let payload = match serde_json::to_value(&status) {
                Ok(p) => p,
                Err(e) => {
                    log::debug!("monitor report: failed to serialize status: {e}");
                    continue;
                }
            };
            let message = match ChordMessage::new(
                request_type::REPORT_STATE,
                payload,
                std::net::Ipv4Addr::from(node.ip).to_string(),
                node.port,
            ) {
                Ok(m) => m,
                Err(e) => {
                    log::debug!("monitor report: failed to build message: {e}");
                    continue;
                }
            };
            match TcpStream::connect(monitor).await {
                Ok(mut stream) => {
                    if let Err(e) = write_message(&mut stream, &message, None).await {
                        log::debug!("monitor report: failed to send to {monitor}: {e}");
                    }
                }
                Err(e) => log::debug!("monitor report: could not reach {monitor}: {e}"),
            }
        }
    });
}

fn spawn_stabilize(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        while node.running() {
            let jitter = rand::thread_rng().gen_range(Duration::from_millis(1)..=node.config.stabilize_interval);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(jitter) => {}
            }
            node.stabilize().await;
        }
    });
}

fn spawn_fix_fingers(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        while node.running() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(node.config.fix_fingers_interval) => {}
            }
            node.fix_fingers().await;
        }
    });
}

fn spawn_check_predecessor(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        while node.running() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(node.config.check_predecessor_interval) => {}
            }
            node.check_predecessor().await;
        }
    });
}

fn spawn_failure_detector(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let interval = node.config.ping_interval;
        let mut detector = FailureDetector::new(node.clone());
        while node.running() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            detector.tick().await;
        }
    });
}

fn spawn_status_log(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        while node.running() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(STATUS_LOG_INTERVAL) => {}
            }
            let status = node.handle_get_status().await;
            log::info!(
                "status [:{}] id={} successor={:?} predecessor={:?} keys={}",
                node.port,
                node.id,
                status.successor,
                status.predecessor,
                status.keys_count
            );
        }
    });
}
