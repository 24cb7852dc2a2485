//! The RPC server: accepts one TCP connection per request, decodes the
//! wire-protocol frame, dispatches on the `type` field to the matching
//! `Node` handler, and writes back a `<TYPE>_RESPONSE` frame. Mirrors the
//! accept-loop-plus-dispatch shape of the socket server this was
//! distilled from, but as a tokio accept loop instead of asyncio's.

use crate::client::optional_node_response;
use crate::node::Node;
use chord_core::wire::{read_message, request_type, write_message, ChordMessage};
use chord_core::{ChordError, Id, NodeInfo};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

pub struct Server {
    node: Arc<Node>,
}

impl Server {
    /// Security is always the node's own, so a server can never drift from
    /// the `RemoteClient`s speaking on the node's behalf.
    pub fn new(node: Arc<Node>) -> Self {
        Server { node }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ChordError> {
        let addr = self.node.info().addr();
        let listener = TcpListener::bind(addr).await?;
        log::info!("chord server listening at {addr}");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            log::warn!("accept error: {e}");
                            continue;
                        }
                    };
                    let node = self.node.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(node, shutdown, stream).await {
                            log::debug!("connection from {peer} ended with error: {e}");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    node: Arc<Node>,
    shutdown: CancellationToken,
    mut stream: TcpStream,
) -> Result<(), ChordError> {
    let security = node.security();
    let request = read_message(&mut stream, security.as_deref()).await?;
    let payload = dispatch(&node, &shutdown, &request.kind, &request.payload).await;
    let response = ChordMessage::new(
        request.response_type(),
        payload,
        std::net::Ipv4Addr::from(node.ip).to_string(),
        node.port,
    )?;
    write_message(&mut stream, &response, security.as_deref()).await
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &serde_json::Value) -> Result<T, serde_json::Value> {
    serde_json::from_value(payload.clone()).map_err(|e| json!({ "error": e.to_string() }))
}

async fn dispatch(
    node: &Arc<Node>,
    shutdown: &CancellationToken,
    kind: &str,
    payload: &serde_json::Value,
) -> serde_json::Value {
    match kind {
        request_type::PING => json!({ "status": "alive", "id": node.id }),

        request_type::FIND_SUCCESSOR => {
            #[derive(Deserialize)]
            struct Req {
                id: Id,
                #[serde(default)]
                hops: u32,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            match node.handle_find_successor(req.id, req.hops).await {
                Ok(found) => optional_node_response(Some(found)),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        request_type::GET_PREDECESSOR => optional_node_response(node.handle_get_predecessor().await),

        request_type::GET_SUCCESSOR => match node.handle_get_successor().await {
            Ok(s) => optional_node_response(Some(s)),
            Err(e) => json!({ "error": e.to_string() }),
        },

        request_type::CLOSEST_PRECEDING_NODE => {
            #[derive(Deserialize)]
            struct Req {
                id: Id,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            match node.handle_closest_preceding_node(req.id).await {
                Ok(found) => optional_node_response(Some(found)),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        request_type::NOTIFY => {
            #[derive(Deserialize)]
            struct Req {
                id: Id,
                ip: [u8; 4],
                port: u16,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            node.handle_notify(NodeInfo::new(req.id, req.ip, req.port)).await;
            json!({ "status": "ok" })
        }

        request_type::STORE_KEY => {
            #[derive(Deserialize)]
            struct Req {
                key: String,
                value: String,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            let ok = node.handle_store_key(req.key, req.value).await;
            json!({ "status": if ok { "ok" } else { "error" } })
        }

        request_type::STORE_REPLICA => {
            #[derive(Deserialize)]
            struct Req {
                key: String,
                value: String,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            let ok = node.handle_store_replica(req.key, req.value).await;
            json!({ "status": if ok { "ok" } else { "error" } })
        }

        request_type::GET_KEY => {
            #[derive(Deserialize)]
            struct Req {
                key: String,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            json!({ "value": node.handle_get_key(&req.key).await })
        }

        request_type::GET_KEYS_IN_RANGE => {
            #[derive(Deserialize)]
            struct Req {
                start: Id,
                end: Id,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            json!({ "keys": node.handle_get_keys_in_arc(req.start, req.end).await })
        }

        request_type::TRANSFER_KEYS => {
            #[derive(Deserialize)]
            struct Req {
                keys: Vec<String>,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            json!({ "data": node.handle_transfer_keys(&req.keys).await })
        }

        request_type::RECEIVE_KEYS => {
            #[derive(Deserialize)]
            struct Req {
                data: std::collections::HashMap<String, String>,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            node.handle_receive_keys(req.data).await;
            json!({ "status": "ok" })
        }

        request_type::GET_SUCCESSOR_LIST => {
            #[derive(Deserialize)]
            struct Req {
                count: usize,
            }
            let req: Req = match parse(payload) {
                Ok(r) => r,
                Err(e) => return e,
            };
            json!({ "successors": node.handle_get_successor_list(req.count).await })
        }

        request_type::GET_STATUS => {
            let status = node.handle_get_status().await;
            serde_json::to_value(status).unwrap_or(json!({ "error": "status serialization failed" }))
        }

        request_type::LEAVE => {
            let node = node.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                node.leave().await;
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                shutdown.cancel();
            });
            json!({ "status": "leaving" })
        }

        other => {
            log::warn!("unknown request type: {other}");
            json!({ "error": "unknown_command" })
        }
    }
}
