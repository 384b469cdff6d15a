//! Schema-driven field rendering: which control a field gets and how its
//! value is shown and read back.

use crate::resolve::ValueSource;
use crate::schema::{FieldDescriptor, ValueType};
use crate::section::is_masked;
use crate::session::EditSession;

use serde::Serialize;
use serde_json::Value;

/// Input control used for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    Toggle,
    Select { options: Vec<String> },
    /// Comma-separated text, split and trimmed on input.
    CommaList,
    MaskedText,
    /// Raw JSON text with a live validity indicator.
    JsonTextArea,
    NumberInput,
    TextInput,
}

/// Map a value type to its control. Unknown types get a plain text input.
pub fn widget_for(value_type: &ValueType) -> Widget {
    match value_type {
        ValueType::Boolean => Widget::Toggle,
        ValueType::Enum(options) => Widget::Select {
            options: options.clone(),
        },
        ValueType::ArrayOfString => Widget::CommaList,
        ValueType::Secret => Widget::MaskedText,
        ValueType::JsonObject => Widget::JsonTextArea,
        ValueType::Integer => Widget::NumberInput,
        ValueType::String | ValueType::Unknown(_) => Widget::TextInput,
    }
}

/// Split comma-separated input into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// State of the JSON validity indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum JsonValidity {
    Empty,
    Valid,
    Invalid(String),
}

pub fn json_validity(raw: &str) -> JsonValidity {
    if raw.trim().is_empty() {
        return JsonValidity::Empty;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(_)) => JsonValidity::Valid,
        Ok(_) => JsonValidity::Invalid("expected a JSON object".into()),
        Err(error) => JsonValidity::Invalid(error.to_string()),
    }
}

/// Convert widget text into a value for the edit buffer.
///
/// Text that does not fit the declared type is kept as a string so the
/// validator can report it. JSON fields stay raw text until save.
pub fn parse_input(field: &FieldDescriptor, raw: &str) -> Value {
    match &field.value_type {
        ValueType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" | "" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        ValueType::Integer => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(raw.to_string()))
            }
        }
        ValueType::ArrayOfString => Value::Array(split_list(raw).into_iter().map(Value::String).collect()),
        ValueType::JsonObject
        | ValueType::Secret
        | ValueType::String
        | ValueType::Enum(_)
        | ValueType::Unknown(_) => Value::String(raw.to_string()),
    }
}

const SECRET_PLACEHOLDER: &str = "********";

/// Text shown in a field's control.
pub fn display_text(field: &FieldDescriptor, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) if field.value_type == ValueType::Secret => {
            if text.is_empty() || is_masked(text) {
                text.clone()
            } else {
                SECRET_PLACEHOLDER.to_string()
            }
        }
        Value::String(text) => text.clone(),
        Value::Array(items) => join_list(items),
        Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Everything a form needs to draw one field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub widget: Widget,
    pub text: String,
    pub editable: bool,
    pub dirty: bool,
    pub source: &'static str,
    pub environment_variable: Option<String>,
    pub documentation: Option<String>,
    pub json_validity: Option<JsonValidity>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

/// Fields sharing a group, in schema order.
#[derive(Debug, Clone, Serialize)]
pub struct FieldGroup {
    pub name: Option<String>,
    pub fields: Vec<FieldView>,
}

/// Build the views for every field of a session, grouped in order of first appearance.
pub fn render_section(session: &EditSession) -> Vec<FieldGroup> {
    let validation = session.validation();
    let section = session.section();
    let mut groups: Vec<FieldGroup> = Vec::new();

    for field in section.schema().iter() {
        let Some(resolved) = session.resolved(&field.name) else {
            continue;
        };
        let text = display_text(field, resolved.value);
        let json_validity = match (&field.value_type, resolved.value) {
            (ValueType::JsonObject, Value::String(raw)) => Some(json_validity(raw)),
            (ValueType::JsonObject, _) => Some(JsonValidity::Valid),
            _ => None,
        };
        let source = match resolved.source {
            _ if field.locked => "locked",
            ValueSource::Buffer => "edited",
            ValueSource::Snapshot => "stored",
            ValueSource::Default => "default",
        };

        let view = FieldView {
            name: field.name.clone(),
            label: field.label(),
            widget: widget_for(&field.value_type),
            text,
            editable: !field.locked,
            dirty: session.buffer().is_dirty(&field.name, section.snapshot()),
            source,
            environment_variable: field.environment_variable.clone(),
            documentation: field.documentation.clone(),
            json_validity,
            error: validation.error(&field.name).map(str::to_string),
            warning: validation.warning(&field.name).map(str::to_string),
        };

        match groups.iter_mut().find(|group| group.name == field.group) {
            Some(group) => group.fields.push(view),
            None => groups.push(FieldGroup {
                name: field.group.clone(),
                fields: vec![view],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SectionSchema;
    use crate::section::ConfigurationSection;
    use crate::validate::Validator;
    use serde_json::{Map, json};
    use std::sync::Arc;

    #[test]
    fn every_value_type_maps_to_a_widget() {
        assert_eq!(widget_for(&ValueType::Boolean), Widget::Toggle);
        assert_eq!(
            widget_for(&ValueType::Enum(vec!["a".into()])),
            Widget::Select {
                options: vec!["a".into()]
            }
        );
        assert_eq!(widget_for(&ValueType::ArrayOfString), Widget::CommaList);
        assert_eq!(widget_for(&ValueType::Secret), Widget::MaskedText);
        assert_eq!(widget_for(&ValueType::JsonObject), Widget::JsonTextArea);
        assert_eq!(widget_for(&ValueType::Integer), Widget::NumberInput);
        assert_eq!(widget_for(&ValueType::String), Widget::TextInput);
        assert_eq!(widget_for(&ValueType::Unknown("color".into())), Widget::TextInput);
    }

    #[test]
    fn comma_lists_are_split_trimmed_and_joined() {
        assert_eq!(split_list(" general, dev ,,ops "), ["general", "dev", "ops"]);
        assert!(split_list("  ").is_empty());
        assert_eq!(join_list(&[json!("general"), json!("dev")]), "general, dev");
    }

    #[test]
    fn json_indicator_reports_each_state() {
        assert_eq!(json_validity(""), JsonValidity::Empty);
        assert_eq!(json_validity(r#"{"a": 1}"#), JsonValidity::Valid);
        assert!(matches!(json_validity("{ broken"), JsonValidity::Invalid(_)));
        assert!(matches!(json_validity("[1]"), JsonValidity::Invalid(_)));
    }

    #[test]
    fn input_is_parsed_by_declared_type() {
        let toggle = FieldDescriptor::new("enabled", ValueType::Boolean);
        assert_eq!(parse_input(&toggle, "on"), json!(true));
        assert_eq!(parse_input(&toggle, "false"), json!(false));

        let number = FieldDescriptor::new("port", ValueType::Integer);
        assert_eq!(parse_input(&number, " 8080 "), json!(8080));
        assert_eq!(parse_input(&number, ""), Value::Null);
        assert_eq!(parse_input(&number, "80a"), json!("80a"));

        let list = FieldDescriptor::new("channels", ValueType::ArrayOfString);
        assert_eq!(parse_input(&list, "a, b"), json!(["a", "b"]));

        let object = FieldDescriptor::new("metadata", ValueType::JsonObject);
        assert_eq!(parse_input(&object, "{ raw"), json!("{ raw"));
    }

    #[test]
    fn secrets_never_display_raw_input() {
        let secret = FieldDescriptor::new("apiKey", ValueType::Secret);
        assert_eq!(display_text(&secret, &json!("sk-live-value")), SECRET_PLACEHOLDER);
        assert_eq!(display_text(&secret, &json!("****1234")), "****1234");
        assert_eq!(display_text(&secret, &Value::Null), "");
    }

    #[test]
    fn render_groups_fields_and_marks_locks() {
        let schema = SectionSchema::new(vec![
            FieldDescriptor::new("botToken", ValueType::Secret)
                .with_env("DISCORD_BOT_TOKEN")
                .with_group("auth")
                .locked(),
            FieldDescriptor::new("prefix", ValueType::String).with_default("!"),
            FieldDescriptor::new("clientId", ValueType::String).with_group("auth"),
            FieldDescriptor::new("metadata", ValueType::JsonObject),
        ]);
        let mut values = Map::new();
        values.insert("botToken".into(), json!("****abcd"));
        let section = ConfigurationSection::new("discord", schema, values);
        let mut session = EditSession::new(section, Arc::new(Validator::default()));
        session.set("prefix", json!("?")).unwrap();
        session.set_input("metadata", "{ nope").unwrap();

        let groups = render_section(&session);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name.as_deref(), Some("auth"));
        assert_eq!(groups[0].fields.len(), 2);
        assert_eq!(groups[1].name, None);

        let token = &groups[0].fields[0];
        assert!(!token.editable);
        assert_eq!(token.source, "locked");
        assert_eq!(token.text, "****abcd");
        assert_eq!(token.environment_variable.as_deref(), Some("DISCORD_BOT_TOKEN"));

        let prefix = &groups[1].fields[0];
        assert!(prefix.editable);
        assert!(prefix.dirty);
        assert_eq!(prefix.source, "edited");
        assert_eq!(prefix.text, "?");

        let metadata = &groups[1].fields[1];
        assert!(matches!(metadata.json_validity, Some(JsonValidity::Invalid(_))));
    }
}
