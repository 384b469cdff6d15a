//! Hivemind config: schema-driven configuration editing for the Open-Hivemind admin client.
//!
//! A section's schema and stored values are fetched together, user edits go
//! into a sparse edit buffer, and every displayed value is resolved from
//! lock status, buffer, snapshot and default in that order.

pub mod config;
pub mod edit;
pub mod error;
pub mod preferences;
pub mod resolve;
pub mod save;
pub mod schema;
pub mod section;
pub mod session;
pub mod store;
pub mod validate;
pub mod widget;

pub use error::{Error, Result};

pub use edit::EditBuffer;
pub use resolve::{Resolved, ValueSource, resolve};
pub use save::{FieldWarning, FieldWarningKind, SaveCoordinator, SaveOutcome};
pub use schema::{FieldDescriptor, SchemaRegistry, SectionSchema, Validation, ValueType};
pub use section::{ConfigurationSection, ValueSnapshot};
pub use session::{EditSession, Notice, NoticeLevel};
pub use validate::{Diagnostic, Severity, ValidationResult, Validator};
