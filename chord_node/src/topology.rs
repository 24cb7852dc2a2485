//! Ring topology state and the pure decision rules that drive it:
//! whether a candidate should replace the current successor or
//! predecessor, and how a successor list is rebuilt by walking the ring.
//! The network calls that feed these rules (stabilize, notify,
//! check_predecessor, failure recovery) live on `Node`, since they need
//! both this state and a way to dial peers; what's here is everything
//! about topology that doesn't need I/O.

use chord_core::{in_arc, Id, NodeInfo};
use std::future::Future;

pub struct TopologyManager {
    predecessor: Option<NodeInfo>,
    successor_list: Vec<NodeInfo>,
}

impl TopologyManager {
    pub fn new(self_info: NodeInfo) -> Self {
        TopologyManager {
            predecessor: None,
            successor_list: vec![self_info],
        }
    }

    pub fn successor(&self) -> NodeInfo {
        self.successor_list[0]
    }

    pub fn predecessor(&self) -> Option<NodeInfo> {
        self.predecessor
    }

    pub fn successor_list(&self) -> &[NodeInfo] {
        &self.successor_list
    }

    pub fn set_predecessor(&mut self, node: NodeInfo) {
        self.predecessor = Some(node);
    }

    pub fn clear_predecessor(&mut self) {
        self.predecessor = None;
    }

    pub fn set_successor(&mut self, node: NodeInfo) {
        self.successor_list[0] = node;
    }

    pub fn set_successor_list(&mut self, list: Vec<NodeInfo>) {
        if !list.is_empty() {
            self.successor_list = list;
        }
    }

    /// Drops the dead primary and promotes the next live entry, as found
    /// by the caller (who does the pinging). Returns `true` if a
    /// replacement was found in the existing list.
    pub fn promote_next_successor(&mut self, alive: NodeInfo) {
        let dead = self.successor_list[0].id;
        self.successor_list.retain(|n| n.id != dead);
        if self.successor_list.first().map(|n| n.id) != Some(alive.id) {
            self.successor_list.insert(0, alive);
        }
    }
}

/// A candidate replaces the successor when the current successor is
/// really just us (nothing has stabilized yet) or the candidate lies
/// strictly between us and the current successor.
pub fn should_update_successor(self_id: Id, current_successor: Id, candidate: Id) -> bool {
    current_successor == self_id || in_arc(self_id, candidate, current_successor, false)
}

/// A candidate replaces the predecessor when there isn't one yet, the
/// existing one is stale (points back to us), or the candidate lies
/// strictly between the existing predecessor and us.
pub fn should_update_predecessor(self_id: Id, current_predecessor: Option<Id>, candidate: Id) -> bool {
    match current_predecessor {
        None => true,
        Some(p) => p == self_id || in_arc(p, candidate, self_id, false),
    }
}

/// Walks `successor -> successor -> ...` up to `max` hops (or until the
/// ring loops back on itself), using `next_of` to ask each node for its
/// own successor. Used both by `stabilize`'s successor-list refresh and
/// by `GET_SUCCESSOR_LIST` when the cached list is too short.
pub async fn build_successor_list<F, Fut>(
    self_id: Id,
    start: NodeInfo,
    max: usize,
    mut next_of: F,
) -> Vec<NodeInfo>
where
    F: FnMut(NodeInfo) -> Fut,
    Fut: Future<Output = Option<NodeInfo>>,
{
    let mut out = Vec::with_capacity(max);
    if max == 0 {
        return out;
    }
    let mut seen = std::collections::HashSet::new();
    seen.insert(self_id);
    let mut current = start;
    loop {
        seen.insert(current.id);
        out.push(current);
        if out.len() >= max {
            break;
        }
        match next_of(current).await {
            Some(next) if !seen.contains(&next.id) => current = next,
            _ => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> Id {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        Id(bytes)
    }

    fn info(byte: u8) -> NodeInfo {
        NodeInfo::new(id(byte), [127, 0, 0, 1], 5000)
    }

    #[test]
    fn update_successor_when_pointing_at_self() {
        assert!(should_update_successor(id(10), id(10), id(20)));
    }

    #[test]
    fn update_successor_when_candidate_is_closer() {
        assert!(should_update_successor(id(10), id(100), id(50)));
        assert!(!should_update_successor(id(10), id(50), id(100)));
    }

    #[test]
    fn update_predecessor_when_absent() {
        assert!(should_update_predecessor(id(10), None, id(5)));
    }

    #[test]
    fn update_predecessor_when_candidate_is_closer() {
        assert!(should_update_predecessor(id(10), Some(id(1)), id(5)));
        assert!(!should_update_predecessor(id(10), Some(id(5)), id(1)));
    }

    #[test]
    fn update_predecessor_rejects_stale_self_pointing_entry() {
        assert!(should_update_predecessor(id(10), Some(id(10)), id(5)));
    }

    #[tokio::test]
    async fn build_successor_list_stops_at_loop() {
        let ring = [info(10), info(20), info(30)];
        let list = build_successor_list(id(10), info(20), 10, |cur| {
            let next = match cur.id.0[31] {
                20 => Some(ring[2]),
                30 => Some(ring[0]),
                _ => None,
            };
            async move { next }
        })
        .await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, info(20).id);
        assert_eq!(list[1].id, info(30).id);
    }

    #[tokio::test]
    async fn build_successor_list_respects_max() {
        let list = build_successor_list(id(99), info(10), 1, |_| async { Some(info(20)) }).await;
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn build_successor_list_includes_self_when_alone_in_the_ring() {
        let list = build_successor_list(id(10), info(10), 3, |_| async { None }).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id(10));
    }
}
