//! Configuration sections: a schema plus the values last fetched from the backend.

use crate::error::StoreError;
use crate::schema::{FieldDescriptor, SectionSchema};
use crate::store::SectionPayload;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Prefix the backend uses when it redacts a secret.
pub const MASK_PREFIX: &str = "****";

/// Whether a string is a redacted secret as returned by the backend.
pub fn is_masked(text: &str) -> bool {
    text.starts_with(MASK_PREFIX)
}

/// Redact a secret, keeping the last four characters. Secrets of four
/// characters or fewer are masked entirely.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() || is_masked(secret) {
        return secret.to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return MASK_PREFIX.to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{MASK_PREFIX}{tail}")
}

/// Immutable view of a section's persisted values.
#[derive(Debug, Clone)]
pub struct ValueSnapshot {
    values: Arc<Map<String, Value>>,
    fetched_at: DateTime<Utc>,
}

impl ValueSnapshot {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(values),
            fetched_at: Utc::now(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// A named, independently fetched and saved group of fields.
///
/// Never mutated in place: every fetch produces a new section that replaces
/// the previous one wholesale.
#[derive(Debug, Clone)]
pub struct ConfigurationSection {
    name: String,
    schema: Arc<SectionSchema>,
    snapshot: ValueSnapshot,
}

impl ConfigurationSection {
    pub fn new(name: impl Into<String>, schema: SectionSchema, values: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            snapshot: ValueSnapshot::new(values),
        }
    }

    /// Build a section from a fetch response.
    pub fn from_payload(name: impl Into<String>, payload: SectionPayload) -> Result<Self, StoreError> {
        let schema = SectionSchema::from_wire(&payload.schema, &payload.values)?;
        Ok(Self::new(name, schema, payload.values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SectionSchema {
        &self.schema
    }

    pub fn snapshot(&self) -> &ValueSnapshot {
        &self.snapshot
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.schema.get(name)
    }

    /// Stored value of a field, if the backend returned one.
    pub fn stored(&self, name: &str) -> Option<&Value> {
        self.snapshot.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_all_but_last_four_characters() {
        assert_eq!(mask_secret("sk-abcdef1234"), "****1234");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn short_secrets_are_masked_entirely() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret("abcde"), "****bcde");
    }

    #[test]
    fn already_masked_values_are_left_alone() {
        assert_eq!(mask_secret("****abcd"), "****abcd");
        assert!(is_masked("****abcd"));
        assert!(!is_masked("plain"));
    }

    #[test]
    fn section_from_payload_exposes_schema_and_snapshot() {
        let payload: SectionPayload = serde_json::from_value(json!({
            "values": { "prefix": "!" },
            "schema": { "prefix": { "type": "string", "default": "!" } }
        }))
        .unwrap();

        let section = ConfigurationSection::from_payload("discord", payload).unwrap();
        assert_eq!(section.name(), "discord");
        assert_eq!(section.stored("prefix"), Some(&json!("!")));
        assert!(section.field("prefix").is_some());
        assert!(section.field("missing").is_none());
        assert_eq!(section.snapshot().len(), 1);
    }
}
