//! REST client for the configuration API.

use crate::config::ApiConfig;
use crate::error::{ConfigError, Result, StoreError};
use crate::store::{ConfigStore, SaveResponse, SectionList, SectionPayload, SectionUpdates};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Talks to `{base_url}/api/config/sections[/{name}]`.
pub struct HttpConfigStore {
    client: reqwest::Client,
    base_url: reqwest::Url,
    token: Option<String>,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    updates: &'a SectionUpdates,
}

impl HttpConfigStore {
    /// Create a client for the given API settings.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let base_url = reqwest::Url::parse(&api.base_url)
            .map_err(|error| ConfigError::Invalid(format!("api.base_url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!("api.base_url '{base_url}' cannot be a base URL")).into());
        }

        let client = reqwest::Client::builder()
            .timeout(api.timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: api.token.clone(),
        })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    fn endpoint(&self, section: Option<&str>) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "config", "sections"]);
            if let Some(section) = section {
                path.push(section);
            }
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> std::result::Result<T, StoreError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|error| StoreError::Decode(error.to_string()))
}

impl ConfigStore for HttpConfigStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_sections(&self) -> std::result::Result<Vec<String>, StoreError> {
        let response = self.authorize(self.client.get(self.endpoint(None))).send().await?;
        let list: SectionList = decode(response).await?;
        Ok(list.sections)
    }

    async fn fetch_section(&self, section: &str) -> std::result::Result<SectionPayload, StoreError> {
        let url = self.endpoint(Some(section));
        tracing::debug!(%url, "fetching configuration section");

        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::UnknownSection(section.to_string()));
        }
        decode(response).await
    }

    async fn save_section(
        &self,
        section: &str,
        updates: SectionUpdates,
    ) -> std::result::Result<SaveResponse, StoreError> {
        let url = self.endpoint(Some(section));
        tracing::debug!(%url, keys = updates.len(), "saving configuration section");

        let response = self
            .authorize(self.client.put(url))
            .json(&SaveRequest { updates: &updates })
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        saves: Vec<(String, Value)>,
        authorization: Vec<String>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    fn record_auth(state: &Shared, headers: &HeaderMap) {
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            state.lock().unwrap().authorization.push(value.to_string());
        }
    }

    async fn list(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
        record_auth(&state, &headers);
        Json(json!({ "sections": ["discord", "llm"] }))
    }

    async fn fetch(
        State(state): State<Shared>,
        headers: HeaderMap,
        Path(name): Path<String>,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        record_auth(&state, &headers);
        match name.as_str() {
            "discord" => Ok(Json(json!({
                "values": { "botToken": "****abcd", "prefix": "!" },
                "schema": {
                    "botToken": { "type": "secret", "locked": true, "env": "DISCORD_BOT_TOKEN" },
                    "prefix": { "type": "string", "default": "!" }
                }
            }))),
            "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn save(
        State(state): State<Shared>,
        Path(name): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.lock().unwrap().saves.push((name, body));
        Json(json!({ "success": true, "updated": ["prefix"], "ignored": ["botToken"] }))
    }

    async fn serve() -> (String, Shared) {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/api/config/sections", get(list))
            .route("/api/config/sections/{name}", get(fetch).put(save))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{address}"), state)
    }

    fn store(base_url: String, token: Option<&str>) -> HttpConfigStore {
        HttpConfigStore::new(&ApiConfig {
            base_url,
            token: token.map(str::to_string),
            ..ApiConfig::default()
        })
        .expect("store should build")
    }

    #[tokio::test]
    async fn fetches_section_with_bearer_token() {
        let (base_url, state) = serve().await;
        let store = store(base_url, Some("secret-token"));

        let payload = store.fetch_section("discord").await.expect("fetch should succeed");
        assert_eq!(payload.values["prefix"], json!("!"));
        assert_eq!(payload.schema["botToken"]["locked"], json!(true));

        let recorded = state.lock().unwrap();
        assert_eq!(recorded.authorization, ["Bearer secret-token"]);
    }

    #[tokio::test]
    async fn lists_sections() {
        let (base_url, _state) = serve().await;
        let sections = store(base_url, None).list_sections().await.unwrap();
        assert_eq!(sections, ["discord", "llm"]);
    }

    #[tokio::test]
    async fn save_sends_only_updates() {
        let (base_url, state) = serve().await;
        let store = store(base_url, None);

        let mut updates = SectionUpdates::new();
        updates.insert("prefix".into(), json!("?"));
        let response = store.save_section("discord", updates).await.unwrap();

        assert!(response.success);
        assert_eq!(response.ignored, ["botToken"]);

        let recorded = state.lock().unwrap();
        assert_eq!(recorded.saves.len(), 1);
        assert_eq!(recorded.saves[0].0, "discord");
        assert_eq!(recorded.saves[0].1, json!({ "updates": { "prefix": "?" } }));
        assert!(recorded.authorization.is_empty());
    }

    #[tokio::test]
    async fn missing_section_is_unknown() {
        let (base_url, _state) = serve().await;
        let error = store(base_url, None).fetch_section("nope").await.unwrap_err();
        assert!(matches!(error, StoreError::UnknownSection(name) if name == "nope"));
    }

    #[tokio::test]
    async fn server_error_carries_status() {
        let (base_url, _state) = serve().await;
        let error = store(base_url, None).fetch_section("broken").await.unwrap_err();
        assert!(matches!(error, StoreError::Status { status: 500, .. }));
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let store = store("http://localhost:3028/admin/".into(), None);
        assert_eq!(
            store.endpoint(Some("llm")).as_str(),
            "http://localhost:3028/admin/api/config/sections/llm"
        );
        assert_eq!(
            store.endpoint(None).as_str(),
            "http://localhost:3028/admin/api/config/sections"
        );
    }
}
