//! Configuration store backends (REST API, in-memory).

pub mod http;
pub mod memory;
pub mod traits;

pub use http::HttpConfigStore;
pub use memory::MemoryConfigStore;
pub use traits::{ConfigStore, ConfigStoreDyn};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partial update: only the keys being changed.
pub type SectionUpdates = Map<String, Value>;

/// A section's current values and schema, as returned by a fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionPayload {
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub schema: Map<String, Value>,
}

/// Backend answer to a save request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Keys the backend applied.
    #[serde(default)]
    pub updated: Vec<String>,
    /// Keys the backend declined to apply, typically because they are locked.
    #[serde(default)]
    pub ignored: Vec<String>,
}

fn default_success() -> bool {
    true
}

impl Default for SaveResponse {
    fn default() -> Self {
        Self {
            success: true,
            message: None,
            updated: Vec::new(),
            ignored: Vec::new(),
        }
    }
}

/// Response body of the section listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionList {
    pub sections: Vec<String>,
}
