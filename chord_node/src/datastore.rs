use chord_core::Id;
use std::collections::HashMap;

/// Local `key -> value` storage. The spec's parallel `key -> key_hash`
/// index is not stored redundantly: `Id::hash(key)` is pure and cheap, so
/// `keys_in_arc` just computes it on the fly, which keeps the "both maps
/// share exactly the same key set" invariant true by construction rather
/// than by upkeep.
#[derive(Debug, Default)]
pub struct DataStore {
    data: HashMap<String, String>,
}

impl DataStore {
    pub fn new() -> Self {
        DataStore::default()
    }

    pub fn store(&mut self, key: String, value: String) -> bool {
        self.data.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    pub fn delete(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Keys whose hash lies in `(start, end]`.
    pub fn keys_in_arc(&self, start: Id, end: Id) -> Vec<String> {
        self.data
            .keys()
            .filter(|key| chord_core::in_arc(start, Id::hash(key.as_str()), end, true))
            .cloned()
            .collect()
    }

    /// Atomically removes and returns the given keys' values.
    pub fn extract(&mut self, keys: &[String]) -> HashMap<String, String> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.data.remove(key) {
                out.insert(key.clone(), value);
            }
        }
        out
    }

    /// Bulk-inserts a `{key -> value}` map, overwriting existing entries.
    pub fn absorb(&mut self, kv: HashMap<String, String>) {
        self.data.extend(kv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_get() {
        let mut store = DataStore::new();
        assert!(store.store("k".into(), "v".into()));
        assert_eq!(store.get("k"), Some("v".into()));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn delete_removes_key() {
        let mut store = DataStore::new();
        store.store("k".into(), "v".into());
        assert_eq!(store.delete("k"), Some("v".into()));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn extract_absorb_roundtrip_is_a_net_no_op() {
        let mut store = DataStore::new();
        store.store("a".into(), "1".into());
        store.store("b".into(), "2".into());
        let keys = vec!["a".to_string(), "b".to_string()];
        let extracted = store.extract(&keys);
        assert!(store.is_empty());
        store.absorb(extracted);
        assert_eq!(store.get("a"), Some("1".into()));
        assert_eq!(store.get("b"), Some("2".into()));
    }

    #[test]
    fn keys_in_arc_filters_by_hash() {
        let mut store = DataStore::new();
        store.store("alpha".into(), "1".into());
        store.store("beta".into(), "2".into());

        let h_alpha = Id::hash("alpha");
        // start == end, inclusive: matches only the key whose hash equals that point
        let keys = store.keys_in_arc(h_alpha, h_alpha);
        assert_eq!(keys, vec!["alpha".to_string()]);

        // start = h_alpha + 1, end = h_alpha wraps around the whole ring
        // except the single point `start`, so it picks up everything
        let start = h_alpha.wrapping_add_pow2(0);
        let mut keys = store.keys_in_arc(start, h_alpha);
        keys.sort();
        assert_eq!(keys, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
