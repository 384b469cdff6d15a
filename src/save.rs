//! Save coordination: turns an edit buffer into a partial update and
//! reconciles the section with the backend afterwards.
//!
//! Lifecycle per section is `Idle -> Saving -> Idle`. A second save for a
//! section that is already saving is rejected, never interleaved, so a stale
//! success can never clear edits made after it was issued.

use crate::edit::EditBuffer;
use crate::error::SaveError;
use crate::schema::ValueType;
use crate::section::ConfigurationSection;
use crate::store::SectionUpdates;
use crate::validate::ValidationResult;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Why a buffered field was not saved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FieldWarningKind {
    /// Raw text in a JSON field did not parse. The key was left out of the save.
    InvalidJson(String),
    /// The field has a blocking validation error. The key was left out of the save.
    Invalid(String),
    /// The field is locked client-side and was dropped from the buffer.
    Locked,
    /// The backend accepted the save but did not apply this key.
    NotUpdated,
}

impl FieldWarningKind {
    /// Whether the entry stays in the buffer after a successful save.
    pub fn keeps_entry(&self) -> bool {
        matches!(self, FieldWarningKind::InvalidJson(_) | FieldWarningKind::Invalid(_))
    }
}

/// Non-fatal, field-scoped save problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWarning {
    pub field: String,
    pub kind: FieldWarningKind,
}

impl std::fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FieldWarningKind::InvalidJson(error) => {
                write!(f, "{}: not saved, invalid JSON ({})", self.field, error)
            }
            FieldWarningKind::Invalid(message) => write!(f, "{}: not saved, {}", self.field, message),
            FieldWarningKind::Locked => write!(f, "{}: locked, not submitted", self.field),
            FieldWarningKind::NotUpdated => write!(f, "{}: not updated by the server", self.field),
        }
    }
}

/// Result of a completed save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub section: String,
    /// Keys sent to the backend.
    pub submitted: Vec<String>,
    pub warnings: Vec<FieldWarning>,
    pub saved_at: DateTime<Utc>,
    /// Set when the save went through but the follow-up fetch failed; the
    /// section still shows the values from before the save.
    pub refresh_error: Option<String>,
}

/// The partial update built from a buffer.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub updates: SectionUpdates,
    pub warnings: Vec<FieldWarning>,
}

/// Build the partial update for a buffer.
///
/// Only buffered keys are included. Locked fields are dropped. JSON fields
/// edited as raw text are parsed; a parse failure skips that key only.
/// Integer fields holding numeric text are sent as numbers.
pub fn build_submission(section: &ConfigurationSection, buffer: &EditBuffer) -> Submission {
    build_validated_submission(section, buffer, &ValidationResult::default())
}

/// Like [`build_submission`], additionally skipping every key with a blocking
/// error in `validation`.
pub fn build_validated_submission(
    section: &ConfigurationSection,
    buffer: &EditBuffer,
    validation: &ValidationResult,
) -> Submission {
    let mut submission = Submission::default();

    for (name, value) in buffer.iter() {
        let field = section.field(name);

        if field.is_some_and(|field| field.locked) {
            submission.warnings.push(FieldWarning {
                field: name.clone(),
                kind: FieldWarningKind::Locked,
            });
            continue;
        }

        if let Some(message) = validation.error(name) {
            tracing::warn!(section = %section.name(), field = %name, %message, "skipping invalid field");
            submission.warnings.push(FieldWarning {
                field: name.clone(),
                kind: FieldWarningKind::Invalid(message.to_string()),
            });
            continue;
        }

        let value = match (field.map(|field| &field.value_type), value) {
            (Some(ValueType::JsonObject), Value::String(raw)) => match parse_json_object(raw) {
                Ok(parsed) => parsed,
                Err(error) => {
                    tracing::warn!(section = %section.name(), field = %name, %error, "skipping field with invalid JSON");
                    submission.warnings.push(FieldWarning {
                        field: name.clone(),
                        kind: FieldWarningKind::InvalidJson(error),
                    });
                    continue;
                }
            },
            (Some(ValueType::Integer), Value::String(text)) => match text.trim().parse::<i64>() {
                Ok(number) => Value::from(number),
                Err(_) => value.clone(),
            },
            _ => value.clone(),
        };

        submission.updates.insert(name.clone(), value);
    }

    submission
}

fn parse_json_object(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err("expected a JSON object".into()),
        Err(error) => Err(error.to_string()),
    }
}

/// Owns the save request lifecycle. The only component that writes to the store.
pub struct SaveCoordinator {
    store: Arc<dyn crate::store::ConfigStoreDyn>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a section as saving until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    section: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.section);
    }
}

impl SaveCoordinator {
    pub fn new(store: Arc<dyn crate::store::ConfigStoreDyn>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn crate::store::ConfigStoreDyn> {
        &self.store
    }

    /// Whether a save for the section is currently running. The UI disables
    /// its save action while this is true.
    pub fn is_saving(&self, section: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(section)
    }

    fn begin(&self, section: &str) -> Result<InFlightGuard<'_>, SaveError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(section.to_string()) {
            return Err(SaveError::InFlight {
                section: section.to_string(),
            });
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            section: section.to_string(),
        })
    }

    /// Submit the buffer for a section.
    ///
    /// On success the saved keys leave the buffer and the section is replaced
    /// by a fresh fetch. On failure neither the buffer nor the section changes.
    pub async fn save(
        &self,
        section: &mut ConfigurationSection,
        buffer: &mut EditBuffer,
    ) -> Result<SaveOutcome, SaveError> {
        self.save_validated(section, buffer, &ValidationResult::default()).await
    }

    /// Submit the buffer, leaving out keys that have a blocking error in
    /// `validation`. Those keys stay buffered and are reported as warnings.
    /// When every submittable key is invalid the save fails with
    /// [`SaveError::Invalid`] and nothing changes.
    pub async fn save_validated(
        &self,
        section: &mut ConfigurationSection,
        buffer: &mut EditBuffer,
        validation: &ValidationResult,
    ) -> Result<SaveOutcome, SaveError> {
        if buffer.is_empty() {
            return Err(SaveError::NothingToSave);
        }
        if buffer.section() != section.name() {
            return Err(SaveError::SectionMismatch {
                section: section.name().to_string(),
                buffer: buffer.section().to_string(),
            });
        }

        let _guard = self.begin(section.name())?;
        let name = section.name().to_string();
        let Submission { updates, mut warnings } = build_validated_submission(section, buffer, validation);
        let submitted: Vec<String> = updates.keys().cloned().collect();

        if updates.is_empty() {
            let invalid: Vec<String> = warnings
                .iter()
                .filter(|w| matches!(w.kind, FieldWarningKind::Invalid(_)))
                .map(|w| w.field.clone())
                .collect();
            if !invalid.is_empty() {
                return Err(SaveError::Invalid {
                    section: name,
                    fields: invalid,
                });
            }

            // Nothing valid left to send. Locked entries are dropped.
            buffer.retain(|field| !warnings.iter().any(|w| w.field == field && w.kind == FieldWarningKind::Locked));
            tracing::info!(section = %name, "no submittable changes, skipping save request");
            return Ok(SaveOutcome {
                section: name,
                submitted,
                warnings,
                saved_at: Utc::now(),
                refresh_error: None,
            });
        }

        let response = self
            .store
            .save_section(&name, updates)
            .await
            .map_err(|source| SaveError::Store {
                section: name.clone(),
                source,
            })?;

        if !response.success {
            let message = response.message.unwrap_or_else(|| "save failed".into());
            tracing::warn!(section = %name, %message, "save rejected by server");
            return Err(SaveError::Rejected { section: name, message });
        }

        for field in &response.ignored {
            tracing::warn!(section = %name, field = %field, "server did not apply field");
            warnings.push(FieldWarning {
                field: field.clone(),
                kind: FieldWarningKind::NotUpdated,
            });
        }

        // Exception to clearing the buffer on success: entries left out for
        // invalid JSON or a validation error stay so the user can fix them.
        buffer.retain(|field| warnings.iter().any(|w| w.field == field && w.kind.keeps_entry()));

        let refresh_error = match self.store.fetch_section(&name).await {
            Ok(payload) => match ConfigurationSection::from_payload(name.clone(), payload) {
                Ok(fresh) => {
                    *section = fresh;
                    None
                }
                Err(error) => Some(error.to_string()),
            },
            Err(error) => Some(error.to_string()),
        };
        if let Some(error) = &refresh_error {
            tracing::warn!(section = %name, %error, "saved but failed to refresh section");
        }

        tracing::info!(section = %name, fields = submitted.len(), warnings = warnings.len(), "section saved");

        Ok(SaveOutcome {
            section: name,
            submitted,
            warnings,
            saved_at: Utc::now(),
            refresh_error,
        })
    }
}
