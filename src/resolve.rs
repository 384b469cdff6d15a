//! Effective value resolution.
//!
//! Precedence, highest first: lock (snapshot, then default), buffer, snapshot, default.

use crate::edit::EditBuffer;
use crate::schema::FieldDescriptor;
use crate::section::ConfigurationSection;
use serde_json::{Map, Value};

/// Where an effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Pending user edit.
    Buffer,
    /// Persisted value from the last fetch.
    Snapshot,
    /// Declared default.
    Default,
}

/// An effective value together with its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a> {
    pub value: &'a Value,
    pub source: ValueSource,
}

/// Compute the value to display and submit for a field.
///
/// Locked fields ignore the buffer entirely.
pub fn resolve<'a>(
    field: &'a FieldDescriptor,
    snapshot: Option<&'a Value>,
    buffer: Option<&'a Value>,
) -> &'a Value {
    resolve_with_source(field, snapshot, buffer).value
}

pub fn resolve_with_source<'a>(
    field: &'a FieldDescriptor,
    snapshot: Option<&'a Value>,
    buffer: Option<&'a Value>,
) -> Resolved<'a> {
    let buffer = if field.locked { None } else { buffer };

    if let Some(value) = buffer {
        return Resolved {
            value,
            source: ValueSource::Buffer,
        };
    }
    if let Some(value) = snapshot {
        return Resolved {
            value,
            source: ValueSource::Snapshot,
        };
    }
    Resolved {
        value: &field.default_value,
        source: ValueSource::Default,
    }
}

/// Resolve a field by name within a section. `None` if the section has no such field.
pub fn resolve_field<'a>(
    section: &'a ConfigurationSection,
    buffer: &'a EditBuffer,
    name: &str,
) -> Option<Resolved<'a>> {
    let field = section.field(name)?;
    Some(resolve_with_source(
        field,
        section.stored(name),
        buffer.get(name),
    ))
}

/// Effective values of every field in schema order.
pub fn effective_values(section: &ConfigurationSection, buffer: &EditBuffer) -> Map<String, Value> {
    section
        .schema()
        .iter()
        .map(|field| {
            let value = resolve(field, section.stored(&field.name), buffer.get(&field.name));
            (field.name.clone(), value.clone())
        })
        .collect()
}
