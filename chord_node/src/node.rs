//! The Chord node itself: composes the data store, finger table and
//! topology state behind one lock, and drives the ring protocol
//! (join, stabilize, fix_fingers, check_predecessor, store/get with
//! replication, leave). Mirrors `ChordNode`/`TopologyManager` from the
//! system this was distilled from, but flattened into one type since
//! Rust's borrow checker makes "three objects each holding a back
//! reference to their parent" (the original's shape) painful to express.

use crate::client::{LocalClient, NodeClient, NodeStatus, RemoteClient};
use crate::config::{ChordConfig, MAX_LOOKUP_HOPS};
use crate::datastore::DataStore;
use crate::finger_table::FingerTable;
use crate::topology::{build_successor_list, should_update_predecessor, should_update_successor, TopologyManager};
use chord_core::security::MessageSecurity;
use chord_core::{in_arc, ChordError, Id, NodeInfo};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

struct NodeState {
    store: DataStore,
    fingers: FingerTable,
    topology: TopologyManager,
}

pub struct Node {
    pub id: Id,
    pub ip: [u8; 4],
    pub port: u16,
    pub config: ChordConfig,
    running: AtomicBool,
    state: RwLock<NodeState>,
    /// Serializes successor-failure recovery so a failed `stabilize` and
    /// a failed `store` that race each other don't both try to pick a
    /// replacement at once.
    recovery_guard: Mutex<()>,
    security: Option<Arc<MessageSecurity>>,
}

impl Node {
    pub fn new(ip: [u8; 4], port: u16, config: ChordConfig) -> Arc<Node> {
        let id = Id::hash(format!("{}:{}", std::net::Ipv4Addr::from(ip), port));
        let self_info = NodeInfo::new(id, ip, port);
        let security = if config.encryption_enabled || config.signature_enabled {
            Some(Arc::new(MessageSecurity::new(&config.secret_key)))
        } else {
            None
        };
        Arc::new(Node {
            id,
            ip,
            port,
            config,
            running: AtomicBool::new(true),
            state: RwLock::new(NodeState {
                store: DataStore::new(),
                fingers: FingerTable::new(),
                topology: TopologyManager::new(self_info),
            }),
            recovery_guard: Mutex::new(()),
            security,
        })
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo::new(self.id, self.ip, self.port)
    }

    /// The message security this node was configured with, shared by its
    /// outgoing `RemoteClient`s and its own RPC server so the two always
    /// agree on whether traffic is signed/encrypted.
    pub fn security(&self) -> Option<Arc<MessageSecurity>> {
        self.security.clone()
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// A `NodeClient` for `target`: the zero-cost local path when
    /// `target` is this node, otherwise a real RPC client.
    pub fn client_for(self: &Arc<Self>, target: NodeInfo) -> Arc<dyn NodeClient> {
        if target.id == self.id {
            Arc::new(LocalClient::new(self.clone()))
        } else {
            Arc::new(RemoteClient::new(
                target,
                self.info(),
                self.config.clone(),
                self.security.clone(),
            ))
        }
    }

    // ---- ring membership -------------------------------------------------

    pub fn create_ring(&self) {
        log::info!("creating new ring at node {}", self.id);
    }

    pub async fn join(self: &Arc<Self>, bootstrap: NodeInfo) -> Result<(), ChordError> {
        log::info!("joining ring through bootstrap {:?}", bootstrap);
        let bootstrap_client = self.client_for(bootstrap);
        let successor = bootstrap_client.find_successor(self.id, 0).await?;
        log::info!("join: successor found {:?}", successor);
        {
            let mut state = self.state.write().await;
            state.topology.set_successor(successor);
        }
        self.acquire_keys_from_successor(successor).await;
        self.initialize_fingers().await;
        log::info!("join completed");
        Ok(())
    }

    async fn acquire_keys_from_successor(self: &Arc<Self>, successor: NodeInfo) {
        let client = self.client_for(successor);
        let start = match client.get_predecessor().await {
            Ok(Some(pred)) => pred.id,
            _ => successor.id,
        };
        let end = self.id;
        let keys = match client.get_keys_in_arc(start, end).await {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("failed to list keys to acquire from successor: {e}");
                return;
            }
        };
        if keys.is_empty() {
            return;
        }
        match client.transfer_keys(keys).await {
            Ok(data) => {
                let count = data.len();
                self.state.write().await.store.absorb(data);
                log::info!("acquired {count} keys from successor");
            }
            Err(e) => log::error!("failed to transfer keys from successor: {e}"),
        }
    }

    async fn initialize_fingers(self: &Arc<Self>) {
        log::info!("finger table initialization starting");
        for i in 0..crate::config::FINGER_TABLE_SIZE {
            let start = FingerTable::start(self.id, i);
            match self.handle_find_successor(start, 0).await {
                Ok(finger) => self.state.write().await.fingers.set(i, finger),
                Err(e) => log::error!("error while initializing finger[{i}]: {e}"),
            }
        }
        log::info!("finger table initialized");
    }

    /// Transfers every locally-held key to the current successor. Called
    /// right before the node exits so the ring doesn't lose data.
    pub async fn leave(self: &Arc<Self>) {
        self.stop();
        let successor = { self.state.read().await.topology.successor() };
        if successor.id == self.id {
            return;
        }
        let all_keys: Vec<String> = {
            let state = self.state.read().await;
            state.store.keys().cloned().collect()
        };
        if all_keys.is_empty() {
            return;
        }
        log::info!("transferring {} keys to successor before leaving", all_keys.len());
        let data = self.state.write().await.store.extract(&all_keys);
        let client = self.client_for(successor);
        if let Err(e) = client.receive_keys(data).await {
            log::error!("failed to transfer keys on leave: {e}");
        }
    }

    // ---- periodic maintenance ---------------------------------------------

    pub async fn stabilize(self: &Arc<Self>) {
        if !self.running() {
            return;
        }
        let successor = { self.state.read().await.topology.successor() };
        let client = self.client_for(successor);
        match client.get_predecessor().await {
            Ok(candidate) => {
                if let Some(candidate) = candidate {
                    if candidate.id != successor.id
                        && should_update_successor(self.id, successor.id, candidate.id)
                    {
                        log::info!("stabilize: updating successor {} -> {}", successor.id, candidate.id);
                        self.state.write().await.topology.set_successor(candidate);
                    }
                }
                let current_successor = { self.state.read().await.topology.successor() };
                let notify_client = self.client_for(current_successor);
                if let Err(e) = notify_client.notify(self.info()).await {
                    log::debug!("notify during stabilize failed: {e}");
                }
                self.refresh_successor_list().await;
            }
            Err(e) => {
                log::warn!("stabilize: successor {} unreachable ({e}), recovering", successor.id);
                self.handle_successor_failure().await;
            }
        }
    }

    async fn refresh_successor_list(self: &Arc<Self>) {
        let successor = { self.state.read().await.topology.successor() };
        let list = build_successor_list(self.id, successor, self.config.replication_factor, |node| {
            let client = self.client_for(node);
            async move { client.get_successor().await.ok() }
        })
        .await;
        self.state.write().await.topology.set_successor_list(list);
    }

    pub async fn fix_fingers(self: &Arc<Self>) {
        if !self.running() {
            return;
        }
        let index = self.state.write().await.fingers.advance();
        let start = FingerTable::start(self.id, index);
        match self.handle_find_successor(start, 0).await {
            Ok(finger) => self.state.write().await.fingers.set(index, finger),
            Err(e) => log::debug!("fix_fingers: error updating finger[{index}]: {e}"),
        }
    }

    pub async fn check_predecessor(self: &Arc<Self>) {
        if !self.running() {
            return;
        }
        let predecessor = { self.state.read().await.topology.predecessor() };
        if let Some(predecessor) = predecessor {
            let client = self.client_for(predecessor);
            if client.ping().await.is_err() {
                log::warn!("predecessor {} unreachable, clearing", predecessor.id);
                self.state.write().await.topology.clear_predecessor();
            }
        }
    }

    pub(crate) async fn handle_successor_failure(self: &Arc<Self>) {
        let _guard = self.recovery_guard.lock().await;
        let (old_successor, rest) = {
            let state = self.state.read().await;
            let list = state.topology.successor_list().to_vec();
            (list[0], list[1..].to_vec())
        };
        if old_successor.id == self.id {
            return;
        }
        for candidate in rest {
            if candidate.id == self.id {
                continue;
            }
            let client = self.client_for(candidate);
            if client.ping().await.is_ok() {
                log::info!("recovered successor from successor list: {}", candidate.id);
                self.state.write().await.topology.promote_next_successor(candidate);
                return;
            }
        }
        let fingers = { self.state.read().await.fingers.entries() };
        for finger in fingers {
            if finger.id == self.id || finger.id == old_successor.id {
                continue;
            }
            let client = self.client_for(finger);
            if client.ping().await.is_ok() {
                log::info!("recovered successor from finger table: {}", finger.id);
                let mut state = self.state.write().await;
                state.topology.set_successor(finger);
                state.topology.set_successor_list(vec![finger]);
                return;
            }
        }
        log::warn!("no reachable successor found, falling back to self");
        let self_info = self.info();
        let mut state = self.state.write().await;
        state.topology.set_successor(self_info);
        state.topology.set_successor_list(vec![self_info]);
    }

    // ---- key/value API -----------------------------------------------------

    pub async fn store(self: &Arc<Self>, key: String, value: String) -> bool {
        if !self.running() {
            return false;
        }
        let key_hash = Id::hash(&key);
        let responsible = match self.handle_find_successor(key_hash, 0).await {
            Ok(node) => node,
            Err(e) => {
                log::warn!("store('{key}'): could not locate responsible node: {e}");
                return false;
            }
        };
        let client = self.client_for(responsible);
        match client.store_key(key.clone(), value).await {
            Ok(true) => {
                log::info!("stored '{key}' at node {}", responsible.id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("store('{key}') failed: {e}");
                false
            }
        }
    }

    pub async fn get(self: &Arc<Self>, key: String) -> Option<String> {
        if !self.running() {
            return None;
        }
        if let Some(value) = self.state.read().await.store.get(&key) {
            return Some(value);
        }
        let key_hash = Id::hash(&key);
        if let Ok(responsible) = self.handle_find_successor(key_hash, 0).await {
            if responsible.id != self.id {
                let client = self.client_for(responsible);
                if let Ok(Some(value)) = client.get_key(key.clone()).await {
                    return Some(value);
                }
            }
        }
        self.get_from_replicas(&key).await
    }

    async fn get_from_replicas(self: &Arc<Self>, key: &str) -> Option<String> {
        let mut seen = HashSet::new();
        seen.insert(self.id);
        let mut candidates = self.handle_get_successor_list(self.config.replication_factor).await;
        if candidates.len() < self.config.replication_factor {
            candidates.extend(self.state.read().await.fingers.entries());
        }
        for candidate in candidates {
            if !seen.insert(candidate.id) {
                continue;
            }
            let client = self.client_for(candidate);
            if let Ok(Some(value)) = client.get_key(key.to_string()).await {
                log::info!("recovered '{key}' from replica/finger at {}", candidate.id);
                return Some(value);
            }
        }
        None
    }

    async fn replicate_to_successors(self: &Arc<Self>, key: &str, value: &str) {
        if self.config.replication_factor <= 1 {
            return;
        }
        let targets = self
            .handle_get_successor_list(self.config.replication_factor - 1)
            .await;
        log::info!("replicating '{key}' to {} successors", targets.len());
        for target in targets {
            if target.id == self.id {
                continue;
            }
            let client = self.client_for(target);
            match client.store_replica(key.to_string(), value.to_string()).await {
                Ok(true) => log::debug!("replicated '{key}' to {}", target.id),
                Ok(false) | Err(_) => log::debug!("failed to replicate '{key}' to {}", target.id),
            }
        }
    }

    // ---- RPC handlers (called by both LocalClient and the TCP server) -----

    pub async fn handle_find_successor(self: &Arc<Self>, id: Id, hops: u32) -> Result<NodeInfo, ChordError> {
        if hops > MAX_LOOKUP_HOPS {
            return Err(ChordError::Protocol("lookup exceeded max hop count".into()));
        }
        let successor = { self.state.read().await.topology.successor() };
        if successor.id == self.id {
            return Ok(successor);
        }
        if in_arc(self.id, id, successor.id, true) {
            return Ok(successor);
        }
        let closest = self.handle_closest_preceding_node(id).await?;
        if closest.id == self.id {
            return Ok(successor);
        }
        let client = self.client_for(closest);
        match client.find_successor(id, hops + 1).await {
            Ok(found) => Ok(found),
            Err(e) => {
                log::debug!("find_successor delegation to {} failed: {e}", closest.id);
                Ok(successor)
            }
        }
    }

    pub async fn handle_closest_preceding_node(self: &Arc<Self>, id: Id) -> Result<NodeInfo, ChordError> {
        let (finger_closest, successor) = {
            let state = self.state.read().await;
            (
                state.fingers.closest_preceding_node(self.id, self.info(), id),
                state.topology.successor(),
            )
        };
        if finger_closest.id != self.id {
            let client = self.client_for(finger_closest);
            if client.ping().await.is_ok() {
                return Ok(finger_closest);
            }
        }
        if successor.id != self.id && in_arc(self.id, successor.id, id, false) {
            return Ok(successor);
        }
        Ok(self.info())
    }

    pub async fn handle_get_predecessor(&self) -> Option<NodeInfo> {
        self.state.read().await.topology.predecessor()
    }

    pub async fn handle_get_successor(&self) -> Result<NodeInfo, ChordError> {
        Ok(self.state.read().await.topology.successor())
    }

    pub(crate) async fn clear_predecessor(&self) {
        self.state.write().await.topology.clear_predecessor();
    }

    pub async fn handle_notify(&self, candidate: NodeInfo) {
        if candidate.id == self.id {
            return;
        }
        let mut state = self.state.write().await;
        let current = state.topology.predecessor().map(|p| p.id);
        if should_update_predecessor(self.id, current, candidate.id) {
            log::info!("updating predecessor -> {}", candidate.id);
            state.topology.set_predecessor(candidate);
        }
    }

    pub async fn handle_store_key(self: &Arc<Self>, key: String, value: String) -> bool {
        {
            let mut state = self.state.write().await;
            state.store.store(key.clone(), value.clone());
        }
        self.replicate_to_successors(&key, &value).await;
        true
    }

    pub async fn handle_store_replica(&self, key: String, value: String) -> bool {
        self.state.write().await.store.store(key, value)
    }

    pub async fn handle_get_key(&self, key: &str) -> Option<String> {
        self.state.read().await.store.get(key)
    }

    pub async fn handle_get_keys_in_arc(&self, start: Id, end: Id) -> Vec<String> {
        self.state.read().await.store.keys_in_arc(start, end)
    }

    pub async fn handle_transfer_keys(&self, keys: &[String]) -> HashMap<String, String> {
        self.state.write().await.store.extract(keys)
    }

    pub async fn handle_receive_keys(&self, data: HashMap<String, String>) {
        self.state.write().await.store.absorb(data);
    }

    pub async fn handle_get_successor_list(self: &Arc<Self>, count: usize) -> Vec<NodeInfo> {
        let (cached, start) = {
            let state = self.state.read().await;
            (state.topology.successor_list().to_vec(), state.topology.successor())
        };
        if cached.len() >= count {
            return cached.into_iter().take(count).collect();
        }
        build_successor_list(self.id, start, count, |node| {
            let client = self.client_for(node);
            async move { client.get_successor().await.ok() }
        })
        .await
    }

    pub async fn handle_get_status(&self) -> NodeStatus {
        let state = self.state.read().await;
        NodeStatus {
            id: self.id,
            ip: self.ip,
            port: self.port,
            successor: Some(state.topology.successor().id).filter(|id| *id != self.id),
            predecessor: state.topology.predecessor().map(|p| p.id),
            keys_count: state.store.len(),
            keys: state.store.keys().cloned().collect(),
        }
    }
}
