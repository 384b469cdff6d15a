//! Client configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3028";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ENV_PREFIX: &str = "HIVEMIND";

/// Configuration for the admin client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Configuration API connection settings.
    pub api: ApiConfig,

    /// Where UI preferences are stored.
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
}

/// Configuration API connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:3028`.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Bearer token. `env:NAME` reads it from the environment.
    #[serde(default)]
    pub token: Option<String>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token: None,
        }
    }
}

impl ClientConfig {
    /// Default config file location (`<config_dir>/hivemind/client.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hivemind").join("client.toml"))
    }

    /// Load from the default config file, if it exists, and the environment.
    pub fn load() -> Result<Self> {
        let file = Self::default_path().filter(|path| path.exists());
        Self::build(file.as_deref(), None, true)
    }

    /// Load from a specific config file path plus the environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::build(Some(path), None, true)
    }

    /// Parse TOML content without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::build(None, Some(content), false)
    }

    fn build(path: Option<&Path>, content: Option<&str>, with_env: bool) -> Result<Self> {
        let source_name = path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<defaults>".into());
        let load_error = |error: ::config::ConfigError| ConfigError::Load {
            path: source_name.clone(),
            source: std::sync::Arc::new(error),
        };

        let mut builder = ::config::Config::builder()
            .set_default("api.base_url", DEFAULT_BASE_URL)
            .and_then(|builder| builder.set_default("api.timeout_secs", DEFAULT_TIMEOUT_SECS))
            .map_err(load_error)?;

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }
        if let Some(content) = content {
            builder = builder.add_source(::config::File::from_str(content, ::config::FileFormat::Toml));
        }
        if with_env {
            builder = builder.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut loaded: ClientConfig = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(load_error)?;

        loaded.api.token = resolve_token(loaded.api.token.take())?;
        loaded.validate()?;

        Ok(loaded)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.api.base_url).map_err(|error| {
            ConfigError::Invalid(format!("api.base_url '{}' is not a URL: {error}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }

    /// Preferences file location, falling back to the platform config directory.
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_path.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("hivemind").join("preferences.toml"))
                .unwrap_or_else(|| PathBuf::from("./preferences.toml"))
        })
    }
}

fn resolve_token(token: Option<String>) -> std::result::Result<Option<String>, ConfigError> {
    let Some(token) = token else {
        return Ok(None);
    };
    match token.strip_prefix("env:") {
        Some(variable) => std::env::var(variable).map(Some).map_err(|_| {
            ConfigError::Invalid(format!("api.token references unset environment variable {variable}"))
        }),
        None if token.is_empty() => Ok(None),
        None => Ok(Some(token)),
    }
}
