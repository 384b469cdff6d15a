//! Edit buffer: the fields a user has touched since the last successful save.

use crate::section::ValueSnapshot;
use serde_json::{Map, Value};

/// Sparse pending values for exactly one section.
///
/// Never persisted. Cleared on successful save or explicit cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    section: String,
    entries: Map<String, Value>,
}

impl EditBuffer {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            entries: Map::new(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Record a pending value, replacing any earlier edit of the same field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.entries.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Drop the pending value for one field, returning it.
    pub fn revert(&mut self, field: &str) -> Option<Value> {
        self.entries.remove(field)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|field, _| keep(field));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Whether the pending value differs from what is stored.
    pub fn is_dirty(&self, field: &str, snapshot: &ValueSnapshot) -> bool {
        match self.entries.get(field) {
            Some(pending) => snapshot.get(field) != Some(pending),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_edits_replace_earlier_ones() {
        let mut buffer = EditBuffer::new("discord");
        buffer.set("prefix", json!("?"));
        buffer.set("prefix", json!("$"));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get("prefix"), Some(&json!("$")));
    }

    #[test]
    fn revert_drops_a_single_entry() {
        let mut buffer = EditBuffer::new("discord");
        buffer.set("prefix", json!("?"));
        buffer.set("name", json!("bot"));
        assert_eq!(buffer.revert("prefix"), Some(json!("?")));
        assert!(!buffer.contains("prefix"));
        assert!(buffer.contains("name"));
    }

    #[test]
    fn dirty_only_when_pending_differs_from_snapshot() {
        let mut values = Map::new();
        values.insert("prefix".into(), json!("!"));
        let snapshot = ValueSnapshot::new(values);

        let mut buffer = EditBuffer::new("discord");
        assert!(!buffer.is_dirty("prefix", &snapshot));

        buffer.set("prefix", json!("!"));
        assert!(!buffer.is_dirty("prefix", &snapshot));

        buffer.set("prefix", json!("?"));
        assert!(buffer.is_dirty("prefix", &snapshot));
    }
}
