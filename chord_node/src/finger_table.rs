//! The finger table: `FINGER_TABLE_SIZE` shortcuts into the ring, finger
//! `i` pointing at the successor of `self.id + 2^i`. Pure data structure —
//! filling in a finger means calling `find_successor`, which lives in
//! `topology` and needs network access, so this type only holds state and
//! answers the two questions that don't: "which finger is next to fix"
//! and "which finger is closest preceding a given id".

use crate::config::FINGER_TABLE_SIZE;
use chord_core::{in_arc, Id, NodeInfo};

pub struct FingerTable {
    fingers: Vec<Option<NodeInfo>>,
    next_finger: u32,
}

impl FingerTable {
    pub fn new() -> Self {
        FingerTable {
            fingers: vec![None; FINGER_TABLE_SIZE as usize],
            next_finger: 0,
        }
    }

    /// The ring id that finger `i` is responsible for: `self_id + 2^i`.
    pub fn start(self_id: Id, index: u32) -> Id {
        self_id.wrapping_add_pow2(index)
    }

    pub fn get(&self, index: u32) -> Option<NodeInfo> {
        self.fingers[index as usize]
    }

    pub fn set(&mut self, index: u32, node: NodeInfo) {
        self.fingers[index as usize] = Some(node);
    }

    /// Advances the round-robin cursor used by the periodic `fix_fingers`
    /// task and returns the index to refresh next.
    pub fn advance(&mut self) -> u32 {
        self.next_finger = (self.next_finger + 1) % FINGER_TABLE_SIZE;
        self.next_finger
    }

    /// The furthest finger strictly preceding `key_id` on the ring,
    /// falling back to `self_info` (the caller) when no finger qualifies.
    pub fn closest_preceding_node(&self, self_id: Id, self_info: NodeInfo, key_id: Id) -> NodeInfo {
        for i in (0..FINGER_TABLE_SIZE).rev() {
            if let Some(finger) = self.fingers[i as usize] {
                if in_arc(self_id, finger.id, key_id, false) {
                    return finger;
                }
            }
        }
        self_info
    }

    pub fn snapshot(&self) -> Vec<Option<Id>> {
        self.fingers.iter().map(|f| f.map(|n| n.id)).collect()
    }

    /// All populated fingers, in table order. Used as a fallback
    /// candidate pool when a key's successor-list owners can't be
    /// reached.
    pub fn entries(&self) -> Vec<NodeInfo> {
        self.fingers.iter().filter_map(|f| *f).collect()
    }
}

impl Default for FingerTable {
    fn default() -> Self {
        FingerTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(byte: u8) -> NodeInfo {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        NodeInfo::new(Id(bytes), [127, 0, 0, 1], 5000)
    }

    #[test]
    fn advance_wraps_around() {
        let mut ft = FingerTable::new();
        assert_eq!(ft.advance(), 1);
        for _ in 0..FINGER_TABLE_SIZE {
            ft.advance();
        }
        assert_eq!(ft.next_finger, 1);
    }

    #[test]
    fn closest_preceding_falls_back_to_self_when_empty() {
        let ft = FingerTable::new();
        let me = info(10);
        let result = ft.closest_preceding_node(me.id, me, info(200).id);
        assert_eq!(result.id, me.id);
    }

    #[test]
    fn closest_preceding_picks_the_farthest_qualifying_finger() {
        let mut ft = FingerTable::new();
        let me = info(10);
        let near = info(50);
        let far = info(150);
        ft.set(2, near);
        ft.set(5, far);
        let result = ft.closest_preceding_node(me.id, me, info(200).id);
        assert_eq!(result.id, far.id);
    }
}
