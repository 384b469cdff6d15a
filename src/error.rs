//! Top-level error types for the configuration client.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Client configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<::config::ConfigError>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures talking to the configuration store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to configuration API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("configuration API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("configuration API returned an unreadable body: {0}")]
    Decode(String),

    #[error("unknown configuration section: {0}")]
    UnknownSection(String),
}

/// A section's schema and snapshot could not be loaded.
#[derive(Debug, thiserror::Error)]
#[error("failed to load section '{section}': {source}")]
pub struct FetchError {
    pub section: String,
    #[source]
    pub source: StoreError,
}

/// Save request failures. The edit buffer is left untouched for every variant.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("nothing to save")]
    NothingToSave,

    #[error("a save for section '{section}' is already in progress")]
    InFlight { section: String },

    #[error("edit buffer belongs to section '{buffer}', not '{section}'")]
    SectionMismatch { section: String, buffer: String },

    #[error("section '{section}' has invalid fields: {}", .fields.join(", "))]
    Invalid { section: String, fields: Vec<String> },

    #[error("server rejected changes to '{section}': {message}")]
    Rejected { section: String, message: String },

    #[error("failed to save section '{section}': {source}")]
    Store {
        section: String,
        #[source]
        source: StoreError,
    },
}

/// Edits refused before they reach the edit buffer.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field '{field}' is locked{}", .environment_variable.as_ref().map(|var| format!(" by {var}")).unwrap_or_default())]
    Locked {
        field: String,
        environment_variable: Option<String>,
    },
}

/// UI preference persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("failed to read preferences from {path}: {source}")]
    Read {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to write preferences to {path}: {source}")]
    Write {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("preferences file {path} is malformed: {message}")]
    Parse { path: String, message: String },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}
