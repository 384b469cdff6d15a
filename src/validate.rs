//! Per-field validation.
//!
//! Rules run in order and the first failure wins: required, numeric bounds,
//! pattern, custom rule. A pattern mismatch on a secret is only a warning.

use crate::edit::EditBuffer;
use crate::resolve::resolve;
use crate::schema::{FieldDescriptor, ValueType};
use crate::section::ConfigurationSection;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A named validation predicate. Returns an error message when the value is invalid.
pub type CustomRule = Arc<dyn Fn(&FieldDescriptor, &Value) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks saving.
    Error,
    /// Shown and logged, never blocks.
    Warning,
}

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub field: String,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn error(field: &FieldDescriptor, message: String) -> Self {
        Self {
            field: field.name.clone(),
            severity: Severity::Error,
            message,
        }
    }

    fn warning(field: &FieldDescriptor, message: String) -> Self {
        Self {
            field: field.name.clone(),
            severity: Severity::Warning,
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Field errors and warnings for a whole section. Always recomputed, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn warning(&self, field: &str) -> Option<&str> {
        self.warnings.get(field).map(String::as_str)
    }

    /// Buffered fields that currently have a blocking error.
    pub fn blocking_fields(&self, buffer: &EditBuffer) -> Vec<String> {
        buffer
            .fields()
            .filter(|field| self.errors.contains_key(*field))
            .map(str::to_string)
            .collect()
    }
}

/// Evaluates field rules. Holds the registry of named custom rules.
#[derive(Clone)]
pub struct Validator {
    rules: HashMap<String, CustomRule>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("Validator").field("rules", &names).finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        let mut validator = Self::empty();
        validator.register("url", Arc::new(url_rule));
        validator.register("non-empty-list", Arc::new(non_empty_list_rule));
        validator
    }
}

impl Validator {
    /// A validator with no custom rules registered.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, rule: CustomRule) {
        self.rules.insert(name.into(), rule);
    }

    /// Blocking error for a field, if any. Warnings are logged and yield `None`.
    pub fn validate(&self, field: &FieldDescriptor, value: &Value) -> Option<String> {
        let diagnostic = self.check(field, value)?;
        match diagnostic.severity {
            Severity::Error => Some(diagnostic.message),
            Severity::Warning => {
                log_warning(&diagnostic);
                None
            }
        }
    }

    /// Evaluate the rules for a field. Warnings are returned rather than logged.
    pub fn check(&self, field: &FieldDescriptor, value: &Value) -> Option<Diagnostic> {
        let label = field.label();

        let empty = is_empty(value);
        if empty && field.required {
            return Some(Diagnostic::error(field, format!("{label} is required")));
        }

        // Bounds and patterns only apply to a present value; custom rules always run.
        if !empty && field.value_type == ValueType::Integer {
            let Some(number) = as_integer(value) else {
                return Some(Diagnostic::error(field, format!("{label} must be a whole number")));
            };
            if let Some(min) = field.validation.min.filter(|min| number < *min) {
                return Some(Diagnostic::error(field, format!("{label} must be at least {min}")));
            }
            if let Some(max) = field.validation.max.filter(|max| number > *max) {
                return Some(Diagnostic::error(field, format!("{label} must be at most {max}")));
            }
        }

        let mut warning = None;
        if let (false, Some(pattern), Value::String(text)) = (empty, &field.validation.pattern, value) {
            match Regex::new(pattern) {
                Ok(regex) if !regex.is_match(text) => {
                    if field.value_type == ValueType::Secret {
                        warning = Some(Diagnostic::warning(
                            field,
                            format!("{label} does not match the expected format"),
                        ));
                    } else {
                        return Some(Diagnostic::error(field, format!("{label} format is invalid")));
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(field = %field.name, %pattern, %error, "ignoring invalid validation pattern");
                }
            }
        }

        if let Some(name) = &field.validation.custom {
            match self.rules.get(name) {
                Some(rule) => {
                    if let Some(message) = rule(field, value) {
                        return Some(Diagnostic::error(field, message));
                    }
                }
                None => {
                    tracing::warn!(field = %field.name, rule = %name, "unknown custom validation rule");
                }
            }
        }

        warning
    }

    /// Validate every field of a section against its effective value.
    /// Locked fields are skipped.
    pub fn validate_section(&self, section: &ConfigurationSection, buffer: &EditBuffer) -> ValidationResult {
        let mut result = ValidationResult::default();

        for field in section.schema().iter().filter(|field| !field.locked) {
            let value = resolve(field, section.stored(&field.name), buffer.get(&field.name));
            if let Some(diagnostic) = self.check(field, value) {
                match diagnostic.severity {
                    Severity::Error => result.errors.insert(diagnostic.field, diagnostic.message),
                    Severity::Warning => result.warnings.insert(diagnostic.field, diagnostic.message),
                };
            }
        }

        result
    }
}

pub(crate) fn log_warning(diagnostic: &Diagnostic) {
    tracing::warn!(field = %diagnostic.field, message = %diagnostic.message, "non-blocking validation warning");
}

/// Empty means null, a blank string or an empty list.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn url_rule(field: &FieldDescriptor, value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text,
        _ => return Some(format!("{} must be a URL", field.label())),
    };
    match reqwest::Url::parse(text.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => None,
        _ => Some(format!("{} must be a valid http(s) URL", field.label())),
    }
}

fn non_empty_list_rule(field: &FieldDescriptor, value: &Value) -> Option<String> {
    let has_entry = value
        .as_array()
        .is_some_and(|items| items.iter().any(|item| item.as_str().is_some_and(|text| !text.trim().is_empty())));
    if has_entry {
        None
    } else {
        Some(format!("{} needs at least one entry", field.label()))
    }
}
