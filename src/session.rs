//! Edit sessions: the state behind one open configuration section.

use crate::edit::EditBuffer;
use crate::error::{EditError, FetchError, SaveError};
use crate::resolve::{Resolved, effective_values, resolve, resolve_field};
use crate::save::{SaveCoordinator, SaveOutcome};
use crate::section::ConfigurationSection;
use crate::validate::{Diagnostic, Severity, ValidationResult, Validator, log_warning};
use crate::widget;

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Error,
    Warning,
}

/// Section-level message shown until the user dismisses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// One section opened for editing, with its pending changes.
#[derive(Debug, Clone)]
pub struct EditSession {
    section: ConfigurationSection,
    buffer: EditBuffer,
    validator: Arc<Validator>,
    notice: Option<Notice>,
}

impl EditSession {
    /// Fetch a section and start editing it with an empty buffer.
    ///
    /// A failed fetch yields no session at all.
    pub async fn open(
        store: &dyn crate::store::ConfigStoreDyn,
        name: &str,
        validator: Arc<Validator>,
    ) -> Result<Self, FetchError> {
        let section = fetch(store, name).await?;
        tracing::debug!(section = %name, fields = section.schema().len(), "section opened");
        Ok(Self::new(section, validator))
    }

    pub fn new(section: ConfigurationSection, validator: Arc<Validator>) -> Self {
        let buffer = EditBuffer::new(section.name());
        Self {
            section,
            buffer,
            validator,
            notice: None,
        }
    }

    pub fn name(&self) -> &str {
        self.section.name()
    }

    pub fn section(&self) -> &ConfigurationSection {
        &self.section
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.section.schema().names()
    }

    pub fn effective(&self, field: &str) -> Option<&Value> {
        self.resolved(field).map(|resolved| resolved.value)
    }

    pub fn resolved(&self, field: &str) -> Option<Resolved<'_>> {
        resolve_field(&self.section, &self.buffer, field)
    }

    pub fn effective_values(&self) -> Map<String, Value> {
        effective_values(&self.section, &self.buffer)
    }

    /// Record an edit and return the field's fresh diagnostic.
    ///
    /// Locked fields are refused outright, so their buffer entry can never exist.
    pub fn set(&mut self, field: &str, value: Value) -> Result<Option<Diagnostic>, EditError> {
        let descriptor = self
            .section
            .field(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        if descriptor.locked {
            return Err(EditError::Locked {
                field: field.to_string(),
                environment_variable: descriptor.environment_variable.clone(),
            });
        }

        self.buffer.set(field, value);

        let effective = resolve(descriptor, self.section.stored(field), self.buffer.get(field));
        let diagnostic = self.validator.check(descriptor, effective);
        if let Some(diagnostic) = diagnostic.as_ref().filter(|d| d.severity == Severity::Warning) {
            log_warning(diagnostic);
        }
        Ok(diagnostic)
    }

    /// Parse widget text for a field and record it.
    pub fn set_input(&mut self, field: &str, raw: &str) -> Result<Option<Diagnostic>, EditError> {
        let descriptor = self
            .section
            .field(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        let value = widget::parse_input(descriptor, raw);
        self.set(field, value)
    }

    /// Drop the pending edit of one field.
    pub fn revert(&mut self, field: &str) -> Option<Value> {
        self.buffer.revert(field)
    }

    /// Discard every pending edit.
    pub fn cancel(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(section = %self.name(), fields = self.buffer.len(), "discarding pending edits");
        }
        self.buffer.clear();
    }

    pub fn is_dirty(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn validation(&self) -> ValidationResult {
        self.validator.validate_section(&self.section, &self.buffer)
    }

    /// Whether the save action should be enabled: at least one pending edit
    /// is free of blocking errors.
    pub fn can_save(&self) -> bool {
        let validation = self.validation();
        self.buffer.fields().any(|field| {
            validation.error(field).is_none() && self.section.field(field).is_some_and(|descriptor| !descriptor.locked)
        })
    }

    /// Save pending edits through the coordinator.
    ///
    /// Fields with a blocking error are left out and stay buffered; the rest
    /// are saved.
    pub async fn save(&mut self, coordinator: &SaveCoordinator) -> Result<SaveOutcome, SaveError> {
        let validation = self.validation();

        match coordinator
            .save_validated(&mut self.section, &mut self.buffer, &validation)
            .await
        {
            Ok(outcome) => {
                self.notice = outcome_notice(&outcome);
                Ok(outcome)
            }
            Err(error) => {
                if !matches!(error, SaveError::NothingToSave) {
                    self.notice = Some(Notice {
                        level: NoticeLevel::Error,
                        message: error.to_string(),
                    });
                }
                Err(error)
            }
        }
    }

    /// Whether the coordinator is currently saving this section.
    pub fn is_saving(&self, coordinator: &SaveCoordinator) -> bool {
        coordinator.is_saving(self.name())
    }

    /// Re-fetch the section, keeping pending edits.
    ///
    /// Lock status is only trusted as of the latest fetch: pending edits of
    /// fields that have become locked are dropped.
    pub async fn reload(&mut self, store: &dyn crate::store::ConfigStoreDyn) -> Result<(), FetchError> {
        let section = match fetch(store, self.name()).await {
            Ok(section) => section,
            Err(error) => {
                self.notice = Some(Notice {
                    level: NoticeLevel::Error,
                    message: error.to_string(),
                });
                return Err(error);
            }
        };

        self.buffer.retain(|field| {
            let locked = section.field(field).is_some_and(|descriptor| descriptor.locked);
            if locked {
                tracing::warn!(section = %section.name(), field = %field, "field became locked, dropping pending edit");
            }
            !locked
        });
        self.section = section;
        Ok(())
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

fn outcome_notice(outcome: &SaveOutcome) -> Option<Notice> {
    if let Some(error) = &outcome.refresh_error {
        return Some(Notice {
            level: NoticeLevel::Warning,
            message: format!("Saved, but the latest values could not be loaded: {error}"),
        });
    }

    let unsaved: Vec<&str> = outcome
        .warnings
        .iter()
        .filter(|warning| warning.kind.keeps_entry())
        .map(|warning| warning.field.as_str())
        .collect();
    if unsaved.is_empty() {
        return None;
    }
    Some(Notice {
        level: NoticeLevel::Warning,
        message: format!("Saved, except fields that still need fixing: {}", unsaved.join(", ")),
    })
}

async fn fetch(store: &dyn crate::store::ConfigStoreDyn, name: &str) -> Result<ConfigurationSection, FetchError> {
    let payload = store.fetch_section(name).await.map_err(|source| FetchError {
        section: name.to_string(),
        source,
    })?;
    ConfigurationSection::from_payload(name, payload).map_err(|source| FetchError {
        section: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ValueSource;
    use crate::save::{FieldWarning, FieldWarningKind};
    use crate::store::MemoryConfigStore;
    use serde_json::json;

    fn discord_store() -> Arc<MemoryConfigStore> {
        Arc::new(MemoryConfigStore::new().with_section(
            "discord",
            json!({
                "botToken": { "type": "secret", "locked": true, "env": "DISCORD_BOT_TOKEN" },
                "prefix": { "type": "string", "default": "!", "required": true },
                "maxMessageLength": { "type": "integer", "default": 2000, "validation": { "min": 1, "max": 4000 } }
            }),
            json!({ "botToken": "real-token-abcd", "prefix": "!" }),
        ))
    }

    async fn open(store: &Arc<MemoryConfigStore>) -> EditSession {
        EditSession::open(&**store, "discord", Arc::new(Validator::default()))
            .await
            .expect("section should open")
    }

    #[tokio::test]
    async fn discord_scenario_end_to_end() {
        let store = discord_store();
        let coordinator = SaveCoordinator::new(store.clone());
        let mut session = open(&store).await;

        assert_eq!(session.effective("botToken"), Some(&json!("****abcd")));

        session.set("prefix", json!("?")).unwrap();
        // Simulates a UI bug writing straight into the buffer of a locked field.
        session.buffer.set("botToken", json!("fake"));

        assert_eq!(session.effective("botToken"), Some(&json!("****abcd")));
        assert_eq!(session.effective("prefix"), Some(&json!("?")));

        let outcome = session.save(&coordinator).await.expect("save should succeed");
        assert!(!session.is_saving(&coordinator));
        assert_eq!(outcome.submitted, ["prefix"]);
        assert_eq!(store.stored_value("discord", "prefix"), Some(json!("?")));
        assert_eq!(store.stored_value("discord", "botToken"), Some(json!("real-token-abcd")));
        assert!(session.buffer().is_empty());
        assert_eq!(session.resolved("prefix").unwrap().source, ValueSource::Snapshot);
    }

    #[tokio::test]
    async fn locked_field_edit_is_refused() {
        let store = discord_store();
        let mut session = open(&store).await;

        let error = session.set("botToken", json!("fake")).unwrap_err();
        assert!(matches!(
            error,
            EditError::Locked { ref environment_variable, .. } if environment_variable.as_deref() == Some("DISCORD_BOT_TOKEN")
        ));
        assert!(session.buffer().is_empty());
    }

    #[tokio::test]
    async fn unknown_field_edit_is_refused() {
        let store = discord_store();
        let mut session = open(&store).await;
        assert!(matches!(
            session.set("nope", json!(1)),
            Err(EditError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn every_edit_revalidates_the_field() {
        let store = discord_store();
        let mut session = open(&store).await;

        let diagnostic = session.set_input("maxMessageLength", "9000").unwrap().unwrap();
        assert_eq!(diagnostic.message, "Max Message Length must be at most 4000");
        assert!(!session.can_save());

        assert!(session.set_input("maxMessageLength", "1500").unwrap().is_none());
        assert_eq!(session.effective("maxMessageLength"), Some(&json!(1500)));
        assert!(session.can_save());
    }

    #[tokio::test]
    async fn save_with_only_invalid_edits_is_refused() {
        let store = discord_store();
        let coordinator = SaveCoordinator::new(store.clone());
        let mut session = open(&store).await;

        session.set("prefix", json!("  ")).unwrap();
        let error = session.save(&coordinator).await.unwrap_err();
        assert!(matches!(error, SaveError::Invalid { ref fields, .. } if fields == &["prefix".to_string()]));
        assert_eq!(store.save_count(), 0);
        assert_eq!(session.buffer().get("prefix"), Some(&json!("  ")));
    }

    #[tokio::test]
    async fn invalid_edit_is_held_back_while_valid_edits_save() {
        let store = discord_store();
        let coordinator = SaveCoordinator::new(store.clone());
        let mut session = open(&store).await;

        session.set("prefix", json!("  ")).unwrap();
        session.set_input("maxMessageLength", "1500").unwrap();
        assert!(session.can_save());

        let outcome = session.save(&coordinator).await.expect("valid edits should save");
        assert_eq!(outcome.submitted, ["maxMessageLength"]);
        assert_eq!(
            outcome.warnings,
            [FieldWarning {
                field: "prefix".into(),
                kind: FieldWarningKind::Invalid("Prefix is required".into()),
            }]
        );
        assert_eq!(store.stored_value("discord", "maxMessageLength"), Some(json!(1500)));
        assert_eq!(store.stored_value("discord", "prefix"), Some(json!("!")));

        assert_eq!(session.buffer().len(), 1);
        assert_eq!(session.buffer().get("prefix"), Some(&json!("  ")));
        let notice = session.notice().expect("notice expected");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("prefix"));
    }

    #[tokio::test]
    async fn save_failure_sets_dismissable_notice_and_keeps_edits() {
        let store = discord_store();
        store.reject_saves(Some("backend is read-only"));
        let coordinator = SaveCoordinator::new(store.clone());
        let mut session = open(&store).await;

        session.set("prefix", json!("?")).unwrap();
        session.save(&coordinator).await.unwrap_err();

        let notice = session.notice().expect("notice expected");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("backend is read-only"));
        assert_eq!(session.effective("prefix"), Some(&json!("?")));

        session.dismiss_notice();
        assert!(session.notice().is_none());
    }

    #[tokio::test]
    async fn cancel_and_revert_restore_stored_values() {
        let store = discord_store();
        let mut session = open(&store).await;

        session.set("prefix", json!("?")).unwrap();
        session.set("maxMessageLength", json!(10)).unwrap();
        session.revert("prefix");
        assert_eq!(session.effective("prefix"), Some(&json!("!")));
        assert!(session.is_dirty());

        session.cancel();
        assert!(!session.is_dirty());
        assert_eq!(session.effective("maxMessageLength"), Some(&json!(2000)));
    }

    #[tokio::test]
    async fn reload_drops_edits_of_newly_locked_fields() {
        let store = discord_store();
        let mut session = open(&store).await;

        session.set("prefix", json!("?")).unwrap();
        session.set("maxMessageLength", json!(100)).unwrap();

        store.set_locked("discord", "prefix", true);
        session.reload(&*store).await.unwrap();

        assert!(!session.buffer().contains("prefix"));
        assert_eq!(session.effective("prefix"), Some(&json!("!")));
        assert_eq!(session.effective("maxMessageLength"), Some(&json!(100)));
    }

    #[tokio::test]
    async fn opening_missing_section_fails_without_session() {
        let store = discord_store();
        let error = EditSession::open(&*store, "slack", Arc::new(Validator::default()))
            .await
            .unwrap_err();
        assert_eq!(error.section, "slack");
    }
}
