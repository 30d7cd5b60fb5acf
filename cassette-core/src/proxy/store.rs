//! Ordered key/value store owned by each proxy
//!
//! Keys and values live in two index-aligned vectors: `values[i]` belongs to
//! `keys[i]`. Lookups are a linear scan by equality, so keys only need
//! `PartialEq` (no hashing or ordering). Stores never shrink.

/// Insert-or-update store keyed by equality
#[derive(Debug, Clone, PartialEq)]
pub struct Store<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Store<K, V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Values in insertion order, aligned with [`Store::keys`]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys.iter().zip(self.values.iter())
    }
}

impl<K: PartialEq, V> Store<K, V> {
    /// Position of `key`, if present
    pub fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Whether `key` has a stored value
    pub fn contains_key(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Look up the value stored for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|index| &self.values[index])
    }

    /// Store `value` under `key`.
    ///
    /// An existing key keeps its position and has its value replaced;
    /// a new key is appended. Returns the previous value, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        match self.position(&key) {
            Some(index) => {
                self.keys[index] = key;
                Some(std::mem::replace(&mut self.values[index], value))
            }
            None => {
                self.keys.push(key);
                self.values.push(value);
                None
            }
        }
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for Store<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Store::new();
        for (key, value) in iter {
            store.put(key, value);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_put_appends_new_keys_in_order() {
        let mut store = Store::new();
        assert!(store.is_empty());

        assert!(store.put("b", 2).is_none());
        assert!(store.put("a", 1).is_none());

        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), &["b", "a"]);
        assert_eq!(store.values(), &[2, 1]);
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let mut store = Store::new();
        store.put("first", 1);
        store.put("second", 2);

        let previous = store.put("first", 10);

        assert_eq!(previous, Some(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), &["first", "second"]);
        assert_eq!(store.get(&"first"), Some(&10));
    }

    #[test]
    fn test_get_missing_key() {
        let mut store: Store<&str, i32> = Store::new();
        store.put("present", 1);

        assert!(store.get(&"absent").is_none());
        assert!(!store.contains_key(&"absent"));
        assert!(store.contains_key(&"present"));
    }

    #[test]
    fn test_unhashable_keys_match_structurally() {
        // serde_json::Value is not Hash; equality alone must be enough
        let mut store: Store<Vec<Value>, &str> = Store::new();
        store.put(vec![json!("call"), json!([1, 2]), json!({"x": 1})], "hit");

        let probe = vec![json!("call"), json!([1, 2]), json!({"x": 1})];
        assert_eq!(store.get(&probe), Some(&"hit"));

        let reordered = vec![json!("call"), json!([2, 1]), json!({"x": 1})];
        assert!(store.get(&reordered).is_none());
    }

    #[test]
    fn test_collect_keeps_last_duplicate() {
        let store: Store<i32, &str> = vec![(1, "a"), (2, "b"), (1, "c")].into_iter().collect();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&1), Some(&"c"));
        let pairs: Vec<_> = store.iter().collect();
        assert_eq!(pairs, vec![(&1, &"c"), (&2, &"b")]);
    }
}
