//! In-process configuration store.
//!
//! Behaves like the real backend where it matters to the client: locked keys
//! are ignored on save and secrets come back masked.

use crate::error::StoreError;
use crate::section::mask_secret;
use crate::store::{ConfigStore, SaveResponse, SectionPayload, SectionUpdates};

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Default)]
struct StoredSection {
    schema: Map<String, Value>,
    values: Map<String, Value>,
}

impl StoredSection {
    fn field_flag(&self, field: &str, flag: &str) -> bool {
        self.schema
            .get(field)
            .and_then(|schema| schema.get(flag))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn is_secret(&self, field: &str) -> bool {
        self.schema
            .get(field)
            .and_then(|schema| schema.get("type"))
            .and_then(Value::as_str)
            == Some("secret")
    }
}

/// Configuration store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    sections: RwLock<BTreeMap<String, StoredSection>>,
    rejection: RwLock<Option<String>>,
    fetches: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a section. `schema` and `values` must be JSON objects.
    pub fn with_section(self, name: impl Into<String>, schema: Value, values: Value) -> Self {
        self.insert_section(name, schema, values);
        self
    }

    pub fn insert_section(&self, name: impl Into<String>, schema: Value, values: Value) {
        let section = StoredSection {
            schema: into_object(schema),
            values: into_object(values),
        };
        self.write_sections().insert(name.into(), section);
    }

    /// Make every save answer `success: false` with the given message, or restore normal saves.
    pub fn reject_saves(&self, message: Option<&str>) {
        *self
            .rejection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message.map(str::to_string);
    }

    /// Change the lock flag of a field, as an operator setting an environment variable would.
    pub fn set_locked(&self, section: &str, field: &str, locked: bool) {
        let mut sections = self.write_sections();
        if let Some(stored) = sections.get_mut(section) {
            let entry = stored
                .schema
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(schema) = entry {
                schema.insert("locked".into(), Value::Bool(locked));
            }
        }
    }

    /// Raw stored value, unmasked.
    pub fn stored_value(&self, section: &str, field: &str) -> Option<Value> {
        self.read_sections()
            .get(section)
            .and_then(|stored| stored.values.get(field).cloned())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn read_sections(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredSection>> {
        self.sections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sections(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredSection>> {
        self.sections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            tracing::warn!(%other, "memory store expected a JSON object, ignoring value");
            Map::new()
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_sections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_sections().keys().cloned().collect())
    }

    async fn fetch_section(&self, section: &str) -> Result<SectionPayload, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let sections = self.read_sections();
        let stored = sections
            .get(section)
            .ok_or_else(|| StoreError::UnknownSection(section.to_string()))?;

        let values = stored
            .values
            .iter()
            .map(|(field, value)| {
                let value = match value {
                    Value::String(secret) if stored.is_secret(field) => Value::String(mask_secret(secret)),
                    other => other.clone(),
                };
                (field.clone(), value)
            })
            .collect();

        Ok(SectionPayload {
            values,
            schema: stored.schema.clone(),
        })
    }

    async fn save_section(&self, section: &str, updates: SectionUpdates) -> Result<SaveResponse, StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self
            .rejection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
        {
            return Ok(SaveResponse {
                success: false,
                message: Some(message),
                ..SaveResponse::default()
            });
        }

        let mut sections = self.write_sections();
        let stored = sections
            .get_mut(section)
            .ok_or_else(|| StoreError::UnknownSection(section.to_string()))?;

        let mut response = SaveResponse::default();
        for (field, value) in updates {
            if stored.field_flag(&field, "locked") {
                response.ignored.push(field);
                continue;
            }
            stored.values.insert(field.clone(), value);
            response.updated.push(field);
        }

        Ok(response)
    }
}
