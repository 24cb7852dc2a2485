//! The `NodeClient` abstraction: every ring operation that can cross a
//! process boundary, behind one trait. `LocalClient` calls the local
//! node's handlers directly; `RemoteClient` issues the hand-rolled wire
//! protocol over TCP. Callers in `topology` and `node` only ever hold a
//! `Arc<dyn NodeClient>` and never know which kind they have.

use crate::config::ChordConfig;
use crate::node::Node;
use async_trait::async_trait;
use chord_core::error::ChordError;
use chord_core::security::MessageSecurity;
use chord_core::wire::{request_type, read_message, write_message, ChordMessage};
use chord_core::{Id, NodeInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[async_trait]
pub trait NodeClient: Send + Sync {
    fn info(&self) -> NodeInfo;
    async fn ping(&self) -> Result<(), ChordError>;
    async fn find_successor(&self, id: Id, hops: u32) -> Result<NodeInfo, ChordError>;
    async fn get_predecessor(&self) -> Result<Option<NodeInfo>, ChordError>;
    async fn get_successor(&self) -> Result<NodeInfo, ChordError>;
    async fn closest_preceding_node(&self, id: Id) -> Result<NodeInfo, ChordError>;
    async fn notify(&self, candidate: NodeInfo) -> Result<(), ChordError>;
    async fn store_key(&self, key: String, value: String) -> Result<bool, ChordError>;
    async fn store_replica(&self, key: String, value: String) -> Result<bool, ChordError>;
    async fn get_key(&self, key: String) -> Result<Option<String>, ChordError>;
    async fn get_keys_in_arc(&self, start: Id, end: Id) -> Result<Vec<String>, ChordError>;
    async fn transfer_keys(&self, keys: Vec<String>) -> Result<HashMap<String, String>, ChordError>;
    async fn receive_keys(&self, data: HashMap<String, String>) -> Result<(), ChordError>;
    async fn get_successor_list(&self, count: usize) -> Result<Vec<NodeInfo>, ChordError>;
    async fn get_status(&self) -> Result<NodeStatus, ChordError>;
    async fn request_leave(&self) -> Result<(), ChordError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: Id,
    pub ip: [u8; 4],
    pub port: u16,
    pub successor: Option<Id>,
    pub predecessor: Option<Id>,
    pub keys_count: usize,
    pub keys: Vec<String>,
}

/// Calls the local node's request handlers directly: no serialization, no
/// network round-trip.
pub struct LocalClient {
    node: Arc<Node>,
}

impl LocalClient {
    pub fn new(node: Arc<Node>) -> Self {
        LocalClient { node }
    }
}

#[async_trait]
impl NodeClient for LocalClient {
    fn info(&self) -> NodeInfo {
        self.node.info()
    }

    async fn ping(&self) -> Result<(), ChordError> {
        Ok(())
    }

    async fn find_successor(&self, id: Id, hops: u32) -> Result<NodeInfo, ChordError> {
        self.node.handle_find_successor(id, hops).await
    }

    async fn get_predecessor(&self) -> Result<Option<NodeInfo>, ChordError> {
        Ok(self.node.handle_get_predecessor().await)
    }

    async fn get_successor(&self) -> Result<NodeInfo, ChordError> {
        self.node.handle_get_successor().await
    }

    async fn closest_preceding_node(&self, id: Id) -> Result<NodeInfo, ChordError> {
        self.node.handle_closest_preceding_node(id).await
    }

    async fn notify(&self, candidate: NodeInfo) -> Result<(), ChordError> {
        self.node.handle_notify(candidate).await;
        Ok(())
    }

    async fn store_key(&self, key: String, value: String) -> Result<bool, ChordError> {
        Ok(self.node.handle_store_key(key, value).await)
    }

    async fn store_replica(&self, key: String, value: String) -> Result<bool, ChordError> {
        Ok(self.node.handle_store_replica(key, value).await)
    }

    async fn get_key(&self, key: String) -> Result<Option<String>, ChordError> {
        Ok(self.node.handle_get_key(&key).await)
    }

    async fn get_keys_in_arc(&self, start: Id, end: Id) -> Result<Vec<String>, ChordError> {
        Ok(self.node.handle_get_keys_in_arc(start, end).await)
    }

    async fn transfer_keys(&self, keys: Vec<String>) -> Result<HashMap<String, String>, ChordError> {
        Ok(self.node.handle_transfer_keys(&keys).await)
    }

    async fn receive_keys(&self, data: HashMap<String, String>) -> Result<(), ChordError> {
        self.node.handle_receive_keys(data).await;
        Ok(())
    }

    async fn get_successor_list(&self, count: usize) -> Result<Vec<NodeInfo>, ChordError> {
        Ok(self.node.handle_get_successor_list(count).await)
    }

    async fn get_status(&self) -> Result<NodeStatus, ChordError> {
        Ok(self.node.handle_get_status().await)
    }

    async fn request_leave(&self) -> Result<(), ChordError> {
        self.node.leave().await;
        Ok(())
    }
}

/// Issues RPCs over the hand-rolled wire protocol (length-prefixed JSON,
/// optionally AES-256-CBC encrypted and HMAC-signed) to a remote peer.
pub struct RemoteClient {
    peer: NodeInfo,
    local: NodeInfo,
    config: ChordConfig,
    security: Option<Arc<MessageSecurity>>,
}

impl RemoteClient {
    pub fn new(
        peer: NodeInfo,
        local: NodeInfo,
        config: ChordConfig,
        security: Option<Arc<MessageSecurity>>,
    ) -> Self {
        RemoteClient {
            peer,
            local,
            config,
            security,
        }
    }

    async fn call<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        kind: &str,
        payload: Req,
    ) -> Result<Resp, ChordError> {
        let request =
            ChordMessage::new(kind, payload, local_ip_string(&self.local), self.local.port)?;
        let addr: SocketAddr = self.peer.addr();
        let fut = async {
            let mut stream = TcpStream::connect(addr).await?;
            write_message(&mut stream, &request, self.security.as_deref()).await?;
            let response = read_message(&mut stream, self.security.as_deref()).await?;
            if response.kind != request.response_type() {
                return Err(ChordError::Protocol(format!(
                    "expected {}, got {}",
                    request.response_type(),
                    response.kind
                )));
            }
            response.payload_as::<Resp>()
        };
        timeout(self.config.net_timeout, fut).await?
    }
}

fn local_ip_string(info: &NodeInfo) -> String {
    std::net::Ipv4Addr::from(info.ip).to_string()
}

#[derive(Serialize)]
struct EmptyRequest {}

#[derive(Serialize, Deserialize)]
struct IdRequest {
    id: Id,
}

#[derive(Serialize, Deserialize)]
struct OptionalNodeResponse {
    id: Option<Id>,
    ip: Option<[u8; 4]>,
    port: Option<u16>,
}

impl OptionalNodeResponse {
    fn into_info(self) -> Option<NodeInfo> {
        match (self.id, self.ip, self.port) {
            (Some(id), Some(ip), Some(port)) => Some(NodeInfo::new(id, ip, port)),
            _ => None,
        }
    }

    fn absent() -> Self {
        OptionalNodeResponse {
            id: None,
            ip: None,
            port: None,
        }
    }

    fn from_info(info: NodeInfo) -> Self {
        OptionalNodeResponse {
            id: Some(info.id),
            ip: Some(info.ip),
            port: Some(info.port),
        }
    }
}

#[async_trait]
impl NodeClient for RemoteClient {
    fn info(&self) -> NodeInfo {
        self.peer
    }

    async fn ping(&self) -> Result<(), ChordError> {
        let _: serde_json::Value = self.call(request_type::PING, EmptyRequest {}).await?;
        Ok(())
    }

    async fn find_successor(&self, id: Id, hops: u32) -> Result<NodeInfo, ChordError> {
        #[derive(Serialize)]
        struct Req {
            id: Id,
            hops: u32,
        }
        let resp: OptionalNodeResponse = self
            .call(request_type::FIND_SUCCESSOR, Req { id, hops })
            .await?;
        resp.into_info().ok_or(ChordError::NotFound)
    }

    async fn get_predecessor(&self) -> Result<Option<NodeInfo>, ChordError> {
        let resp: OptionalNodeResponse =
            self.call(request_type::GET_PREDECESSOR, EmptyRequest {}).await?;
        Ok(resp.into_info())
    }

    async fn get_successor(&self) -> Result<NodeInfo, ChordError> {
        let resp: OptionalNodeResponse =
            self.call(request_type::GET_SUCCESSOR, EmptyRequest {}).await?;
        resp.into_info().ok_or(ChordError::NotFound)
    }

    async fn closest_preceding_node(&self, id: Id) -> Result<NodeInfo, ChordError> {
        let resp: OptionalNodeResponse = self
            .call(request_type::CLOSEST_PRECEDING_NODE, IdRequest { id })
            .await?;
        resp.into_info().ok_or(ChordError::NotFound)
    }

    async fn notify(&self, candidate: NodeInfo) -> Result<(), ChordError> {
        #[derive(Serialize)]
        struct Req {
            id: Id,
            ip: [u8; 4],
            port: u16,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: String,
        }
        let resp: Resp = self
            .call(
                request_type::NOTIFY,
                Req {
                    id: candidate.id,
                    ip: candidate.ip,
                    port: candidate.port,
                },
            )
            .await?;
        if resp.status == "ok" {
            Ok(())
        } else {
            Err(ChordError::Protocol("notify rejected".into()))
        }
    }

    async fn store_key(&self, key: String, value: String) -> Result<bool, ChordError> {
        #[derive(Serialize)]
        struct Req {
            key: String,
            value: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: String,
        }
        let resp: Resp = self.call(request_type::STORE_KEY, Req { key, value }).await?;
        Ok(resp.status == "ok")
    }

    async fn store_replica(&self, key: String, value: String) -> Result<bool, ChordError> {
        #[derive(Serialize)]
        struct Req {
            key: String,
            value: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: String,
        }
        let resp: Resp = self
            .call(request_type::STORE_REPLICA, Req { key, value })
            .await?;
        Ok(resp.status == "ok")
    }

    async fn get_key(&self, key: String) -> Result<Option<String>, ChordError> {
        #[derive(Serialize)]
        struct Req {
            key: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            value: Option<String>,
        }
        let resp: Resp = self.call(request_type::GET_KEY, Req { key }).await?;
        Ok(resp.value)
    }

    async fn get_keys_in_arc(&self, start: Id, end: Id) -> Result<Vec<String>, ChordError> {
        #[derive(Serialize)]
        struct Req {
            start: Id,
            end: Id,
        }
        #[derive(Deserialize)]
        struct Resp {
            keys: Vec<String>,
        }
        let resp: Resp = self
            .call(request_type::GET_KEYS_IN_RANGE, Req { start, end })
            .await?;
        Ok(resp.keys)
    }

    async fn transfer_keys(&self, keys: Vec<String>) -> Result<HashMap<String, String>, ChordError> {
        #[derive(Serialize)]
        struct Req {
            keys: Vec<String>,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: HashMap<String, String>,
        }
        let resp: Resp = self.call(request_type::TRANSFER_KEYS, Req { keys }).await?;
        Ok(resp.data)
    }

    async fn receive_keys(&self, data: HashMap<String, String>) -> Result<(), ChordError> {
        #[derive(Serialize)]
        struct Req {
            data: HashMap<String, String>,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: String,
        }
        let resp: Resp = self.call(request_type::RECEIVE_KEYS, Req { data }).await?;
        if resp.status == "ok" {
            Ok(())
        } else {
            Err(ChordError::Protocol("receive_keys rejected".into()))
        }
    }

    async fn get_successor_list(&self, count: usize) -> Result<Vec<NodeInfo>, ChordError> {
        #[derive(Serialize)]
        struct Req {
            count: usize,
        }
        #[derive(Deserialize)]
        struct Resp {
            successors: Vec<NodeInfo>,
        }
        let resp: Resp = self
            .call(request_type::GET_SUCCESSOR_LIST, Req { count })
            .await?;
        Ok(resp.successors)
    }

    async fn get_status(&self) -> Result<NodeStatus, ChordError> {
        self.call(request_type::GET_STATUS, EmptyRequest {}).await
    }

    async fn request_leave(&self) -> Result<(), ChordError> {
        #[derive(Deserialize)]
        struct Resp {
            status: String,
        }
        let resp: Resp = self.call(request_type::LEAVE, EmptyRequest {}).await?;
        if resp.status == "leaving" {
            Ok(())
        } else {
            Err(ChordError::Protocol("leave rejected".into()))
        }
    }
}

// Re-exported so `server.rs` can build the same optional-node response
// shape the RemoteClient parses.
pub(crate) fn optional_node_response(info: Option<NodeInfo>) -> serde_json::Value {
    let resp = match info {
        Some(info) => OptionalNodeResponse::from_info(info),
        None => OptionalNodeResponse::absent(),
    };
    serde_json::to_value(resp).expect("OptionalNodeResponse always serializes")
}
