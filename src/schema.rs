//! Schema registry: per-section field descriptors and their value types.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The closed set of value types a configuration field can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    String,
    /// Credentials such as API keys and bot tokens. Displayed masked.
    Secret,
    Enum(Vec<String>),
    ArrayOfString,
    JsonObject,
    /// A type tag this client does not know. Treated as plain text.
    Unknown(String),
}

impl ValueType {
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::String => "string",
            ValueType::Secret => "secret",
            ValueType::Enum(_) => "enum",
            ValueType::ArrayOfString => "array-of-string",
            ValueType::JsonObject => "json-object",
            ValueType::Unknown(tag) => tag.as_str(),
        }
    }

    /// Parse a wire type tag. `options` only matters for `enum`.
    pub fn parse(tag: &str, options: Vec<String>) -> Self {
        match tag {
            "boolean" => ValueType::Boolean,
            "integer" => ValueType::Integer,
            "string" => ValueType::String,
            "secret" => ValueType::Secret,
            "enum" => ValueType::Enum(options),
            "array-of-string" => ValueType::ArrayOfString,
            "json-object" => ValueType::JsonObject,
            other => ValueType::Unknown(other.to_string()),
        }
    }

    /// Guess a type from a stored value.
    ///
    /// Compatibility shim for sections whose schema omits type metadata; the
    /// declared type is always preferred when present.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(number) if number.is_i64() || number.is_u64() => ValueType::Integer,
            Value::Array(_) => ValueType::ArrayOfString,
            Value::Object(_) => ValueType::JsonObject,
            Value::String(text) if crate::section::is_masked(text) => ValueType::Secret,
            _ => ValueType::String,
        }
    }

    /// Value used when a field declares no default.
    pub fn empty_value(&self) -> Value {
        match self {
            ValueType::Boolean => Value::Bool(false),
            ValueType::ArrayOfString => Value::Array(Vec::new()),
            ValueType::JsonObject => Value::Object(Map::new()),
            _ => Value::Null,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional per-field validation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Name of a rule registered with the [`Validator`](crate::validate::Validator).
    #[serde(default)]
    pub custom: Option<String>,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.pattern.is_none() && self.custom.is_none()
    }
}

/// Describes one configurable field of a section.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: Option<String>,
    pub value_type: ValueType,
    pub default_value: Value,
    pub documentation: Option<String>,
    /// Environment variable that can supply this field externally.
    pub environment_variable: Option<String>,
    /// Fixed by environment or server policy; never editable client-side.
    pub locked: bool,
    pub required: bool,
    pub group: Option<String>,
    pub validation: Validation,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let default_value = value_type.empty_value();
        Self {
            name: name.into(),
            label: None,
            value_type,
            default_value,
            documentation: None,
            environment_variable: None,
            locked: false,
            required: false,
            group: None,
            validation: Validation::default(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_env(mut self, variable: impl Into<String>) -> Self {
        self.environment_variable = Some(variable.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Human-readable label, derived from the field name when none is declared.
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => humanize(&self.name),
        }
    }

    fn from_wire(name: &str, wire: FieldSchema, stored: Option<&Value>) -> Self {
        let value_type = match wire.kind {
            Some(tag) => ValueType::parse(&tag, wire.options),
            None => {
                let inferred = stored.map(ValueType::infer).unwrap_or(ValueType::String);
                tracing::debug!(field = %name, inferred = %inferred, "schema has no type, inferring from stored value");
                inferred
            }
        };
        let default_value = wire.default.unwrap_or_else(|| value_type.empty_value());

        Self {
            name: name.to_string(),
            label: wire.label,
            value_type,
            default_value,
            documentation: wire.description,
            environment_variable: wire.env,
            locked: wire.locked,
            required: wire.required,
            group: wire.group,
            validation: wire.validation.unwrap_or_default(),
        }
    }
}

/// Field metadata as the configuration API sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "documentation", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "environmentVariable", skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

/// Field descriptors of one section, in the order the backend declared them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSchema {
    fields: Vec<FieldDescriptor>,
}

impl SectionSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Build a schema from the wire format.
    ///
    /// Stored values without a schema entry get a synthesised, unlocked
    /// descriptor whose type is inferred from the value.
    pub fn from_wire(schema: &Map<String, Value>, values: &Map<String, Value>) -> Result<Self, StoreError> {
        let mut fields = Vec::with_capacity(schema.len().max(values.len()));

        for (name, raw) in schema {
            let wire: FieldSchema = serde_json::from_value(raw.clone()).map_err(|error| {
                StoreError::Decode(format!("invalid schema for field '{name}': {error}"))
            })?;
            fields.push(FieldDescriptor::from_wire(name, wire, values.get(name)));
        }

        for (name, value) in values {
            if schema.contains_key(name) {
                continue;
            }
            tracing::debug!(field = %name, "stored value has no schema entry, synthesising descriptor");
            fields.push(FieldDescriptor::from_wire(name, FieldSchema::default(), Some(value)));
        }

        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Latest known schema of every section, keyed by section name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    sections: BTreeMap<String, Arc<SectionSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the schema of a section, replacing the previous one wholesale.
    pub fn register(&mut self, section: impl Into<String>, schema: Arc<SectionSchema>) {
        self.sections.insert(section.into(), schema);
    }

    pub fn remove(&mut self, section: &str) -> Option<Arc<SectionSchema>> {
        self.sections.remove(section)
    }

    pub fn section(&self, section: &str) -> Option<&Arc<SectionSchema>> {
        self.sections.get(section)
    }

    pub fn field(&self, section: &str, field: &str) -> Option<&FieldDescriptor> {
        self.sections.get(section)?.get(field)
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Turn `botToken`, `max_tokens` or `api-base` into `Bot Token`, `Max Tokens`, `Api Base`.
pub fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for character in name.chars() {
        if character == '_' || character == '-' || character == '.' || character == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if character.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = character.is_lowercase() || character.is_ascii_digit();
        current.push(character);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
