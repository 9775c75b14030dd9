use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::models::site_config::SiteConfig;

#[derive(Debug, thiserror::Error)]
pub enum RemoteConfigError {
    #[error("remote config request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("remote config service answered {0}")]
    Status(StatusCode),
    #[error("remote config body is not JSON: {0}")]
    Body(#[from] serde_json::Error),
}

/// Whole-value remote backing for the site configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteConfigService: Send + Sync {
    /// `Ok(None)` means the remote side has nothing stored.
    async fn fetch(&self) -> Result<Option<Value>, RemoteConfigError>;
    async fn save(&self, config: &SiteConfig) -> Result<(), RemoteConfigError>;
}

/// Used when no remote is configured: never has data, accepts every write.
pub struct NullRemoteConfig;

#[async_trait]
impl RemoteConfigService for NullRemoteConfig {
    async fn fetch(&self) -> Result<Option<Value>, RemoteConfigError> {
        Ok(None)
    }

    async fn save(&self, _config: &SiteConfig) -> Result<(), RemoteConfigError> {
        Ok(())
    }
}

/// REST-style document endpoint: `GET` returns the document, `PUT` replaces it.
pub struct HttpRemoteConfig {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRemoteConfig {
    pub fn new(client: Client, url: String, api_key: Option<String>) -> Self {
        Self { client, url, api_key }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteConfigService for HttpRemoteConfig {
    async fn fetch(&self) -> Result<Option<Value>, RemoteConfigError> {
        let response = self
            .authorize(self.client.get(&self.url))
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteConfigError::Status(response.status()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let document = match serde_json::from_str::<Value>(&body)? {
            Value::Null => None,
            // row-returning REST APIs wrap the document in an array
            Value::Array(rows) => rows.into_iter().next().filter(|row| !row.is_null()),
            other => Some(other),
        };
        debug!(found = document.is_some(), "Fetched remote site config");
        Ok(document)
    }

    async fn save(&self, config: &SiteConfig) -> Result<(), RemoteConfigError> {
        let response = self
            .authorize(self.client.put(&self.url))
            .json(config)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteConfigError::Status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_null_remote_is_empty_and_accepts_writes() {
        let remote = NullRemoteConfig;
        assert!(remote.fetch().await.unwrap().is_none());
        assert!(remote.save(&SiteConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_remote_round_trip() {
        let stored: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/config",
                get(|State(s): State<Arc<Mutex<Option<Value>>>>| async move {
                    Json(s.lock().await.clone().unwrap_or(Value::Null))
                })
                .put(
                    |State(s): State<Arc<Mutex<Option<Value>>>>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        assert_eq!(headers.get("apikey").unwrap(), "secret");
                        *s.lock().await = Some(body);
                    },
                ),
            )
            .with_state(stored.clone());
        let base = spawn_server(app).await;
        let remote = HttpRemoteConfig::new(Client::new(), format!("{base}/config"), Some("secret".into()));

        assert!(remote.fetch().await.unwrap().is_none());

        let config = SiteConfig::default().with_text(crate::models::site_config::TextSlot::HeroTitle, "Remoto");
        remote.save(&config).await.unwrap();

        let fetched = remote.fetch().await.unwrap().unwrap();
        assert_eq!(fetched["texts"]["heroTitle"], json!("Remoto"));
    }

    #[tokio::test]
    async fn test_http_remote_unwraps_row_arrays_and_maps_errors() {
        let app = Router::new()
            .route("/rows", get(|| async { Json(json!([{ "colors": { "primary": "#000000" } }])) }))
            .route("/empty", get(|| async { Json(json!([])) }))
            .route("/broken", get(|| async { (axum::http::StatusCode::BAD_GATEWAY, "down") }));
        let base = spawn_server(app).await;

        let rows = HttpRemoteConfig::new(Client::new(), format!("{base}/rows"), None);
        assert_eq!(rows.fetch().await.unwrap().unwrap()["colors"]["primary"], json!("#000000"));

        let empty = HttpRemoteConfig::new(Client::new(), format!("{base}/empty"), None);
        assert!(empty.fetch().await.unwrap().is_none());

        let missing = HttpRemoteConfig::new(Client::new(), format!("{base}/nope"), None);
        assert!(missing.fetch().await.unwrap().is_none());

        let broken = HttpRemoteConfig::new(Client::new(), format!("{base}/broken"), None);
        assert!(matches!(
            broken.fetch().await,
            Err(RemoteConfigError::Status(StatusCode::BAD_GATEWAY))
        ));
    }
}
