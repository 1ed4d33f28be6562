//! The attribute map shared by every valve of one invocation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A flat, last-write-wins attribute map.
///
/// One map serves the whole call tree of an invocation. There is no
/// scoping: nested loops that use the same counter name overwrite each
/// other's counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    data: HashMap<String, serde_json::Value>,
}

impl Attributes {
    /// Creates a new empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an attribute map from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Gets an integer value.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(serde_json::Value::as_i64)
    }

    /// Gets a boolean value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a value, returning the one it replaced.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut attrs = Attributes::new();
        attrs.set("key", "value");

        assert_eq!(attrs.get_str("key"), Some("value"));
        assert!(attrs.contains_key("key"));
        assert!(!attrs.contains_key("other"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.set("loopCount", 1), None);
        assert_eq!(attrs.set("loopCount", 2), Some(serde_json::json!(1)));

        assert_eq!(attrs.get_i64("loopCount"), Some(2));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_typed_getters_mismatch() {
        let attrs: Attributes = [("flag", serde_json::json!(true))].into_iter().collect();

        assert_eq!(attrs.get_bool("flag"), Some(true));
        assert_eq!(attrs.get_i64("flag"), None);
        assert_eq!(attrs.get_str("missing"), None);
    }

    #[test]
    fn test_remove_and_keys() {
        let mut attrs = Attributes::new();
        attrs.set("a", 1);
        attrs.set("b", 2);
        attrs.remove("a");

        assert_eq!(attrs.keys(), vec!["b".to_string()]);
        assert!(!attrs.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut attrs = Attributes::new();
        attrs.set("x", 1);

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json, serde_json::json!({"x": 1}));
    }
}
