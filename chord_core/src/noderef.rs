use crate::id::Id;
use serde::{Deserialize, Serialize};

/// A plain-value reference to a node: its ring identifier plus the address
/// to dial. Cheap to clone, carries no connection state of its own — the
/// distinction between "this is me" and "this is a peer" lives in
/// `NodeClient` (see `chord_node::client`), not in this type.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: Id,
    pub ip: [u8; 4],
    pub port: u16,
}

impl NodeInfo {
    pub fn new(id: Id, ip: [u8; 4], port: u16) -> Self {
        NodeInfo { id, ip, port }
    }

    pub fn addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from((self.ip, self.port))
    }
}

impl std::fmt::Debug for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeInfo({}, {})", self.id, self.addr())
    }
}
