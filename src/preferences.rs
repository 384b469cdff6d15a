//! UI preferences behind a small persistence port.

use crate::error::PreferencesError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Preferences remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    /// Section opened most recently.
    pub last_section: Option<String>,
    /// Show field documentation and environment variable hints.
    pub show_advanced: bool,
    /// Field groups the user collapsed.
    pub collapsed_groups: BTreeSet<String>,
}

/// Where preferences are loaded from and saved to. Injected, never global.
pub trait PreferencesStore: Send + Sync {
    fn load_preferences(&self) -> Result<UiPreferences, PreferencesError>;

    fn save_preferences(&self, preferences: &UiPreferences) -> Result<(), PreferencesError>;
}

/// Preferences stored as a TOML file.
#[derive(Debug, Clone)]
pub struct FilePreferencesStore {
    path: PathBuf,
}

impl FilePreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesStore for FilePreferencesStore {
    /// A missing file yields defaults.
    fn load_preferences(&self) -> Result<UiPreferences, PreferencesError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(UiPreferences::default());
            }
            Err(error) => {
                return Err(PreferencesError::Read {
                    path: self.path.display().to_string(),
                    source: Arc::new(error),
                });
            }
        };

        toml::from_str(&content).map_err(|error| PreferencesError::Parse {
            path: self.path.display().to_string(),
            message: error.to_string(),
        })
    }

    fn save_preferences(&self, preferences: &UiPreferences) -> Result<(), PreferencesError> {
        let content = toml::to_string_pretty(preferences)?;
        let write_error = |error: std::io::Error| PreferencesError::Write {
            path: self.path.display().to_string(),
            source: Arc::new(error),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(&self.path, content).map_err(write_error)
    }
}

/// Preferences held in memory only.
#[derive(Debug, Default)]
pub struct MemoryPreferencesStore {
    preferences: Mutex<UiPreferences>,
}

impl PreferencesStore for MemoryPreferencesStore {
    fn load_preferences(&self) -> Result<UiPreferences, PreferencesError> {
        Ok(self
            .preferences
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save_preferences(&self, preferences: &UiPreferences) -> Result<(), PreferencesError> {
        *self
            .preferences
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = preferences.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferencesStore::new(dir.path().join("preferences.toml"));
        assert_eq!(store.load_preferences().unwrap(), UiPreferences::default());
    }

    #[test]
    fn saved_preferences_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferencesStore::new(dir.path().join("nested").join("preferences.toml"));

        let preferences = UiPreferences {
            last_section: Some("llm".into()),
            show_advanced: true,
            collapsed_groups: BTreeSet::from(["auth".to_string()]),
        };
        store.save_preferences(&preferences).unwrap();

        assert_eq!(store.load_preferences().unwrap(), preferences);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, indoc! {r#"
            last_section = "discord"
        "#})
        .unwrap();

        let loaded = FilePreferencesStore::new(path).load_preferences().unwrap();
        assert_eq!(loaded.last_section.as_deref(), Some("discord"));
        assert!(!loaded.show_advanced);
        assert!(loaded.collapsed_groups.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "show_advanced = \"sometimes\"").unwrap();

        let error = FilePreferencesStore::new(path).load_preferences().unwrap_err();
        assert!(matches!(error, PreferencesError::Parse { .. }));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryPreferencesStore::default();
        let mut preferences = store.load_preferences().unwrap();
        preferences.show_advanced = true;
        store.save_preferences(&preferences).unwrap();
        assert!(store.load_preferences().unwrap().show_advanced);
    }
}
