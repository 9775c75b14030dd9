use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use dashmap::DashMap;
use serde_json::Value;
use tower::ServiceExt;
use diesel::r2d2::{self, ConnectionManager};
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;

use crate::api::remote_config::{NullRemoteConfig, RemoteConfigService};
use crate::api::text_generation::{DisabledGenerator, TextGenerator};
use crate::api::webhook::{outbound_client, OUTBOUND_TIMEOUT};
use crate::config::defaults::REVENUE_RANGES;
use crate::config::settings::{AdminCredentials, Settings};
use crate::controllers::config_controller::ConfigController;
use crate::models::lead_models::LeadDraft;
use crate::repositories::config_store::{ConfigStoreError, LocalConfigStore};
use crate::handlers::auth_handlers::issue_token;
use crate::repositories::lead_repository::LeadRepository;
use crate::{build_router, AppState, DbPool, MIGRATIONS};

pub const TEST_ADMIN_EMAIL: &str = "admin@nghub.test";
pub const TEST_ADMIN_PASSWORD: &str = "segredo-forte";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

/// Single-connection in-memory database with the schema applied.
pub fn test_pool() -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("in-memory pool");
    let mut conn = pool.get().expect("connection");
    conn.run_pending_migrations(MIGRATIONS).expect("migrations");
    pool
}

#[derive(Default)]
pub struct MemoryConfigStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryConfigStore {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        store
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }
}

impl LocalConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigStoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        if let Some(capacity) = self.capacity {
            if value.len() > capacity {
                return Err(ConfigStoreError::QuotaExceeded {
                    needed: value.len(),
                    capacity,
                });
            }
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn filled_draft() -> LeadDraft {
    LeadDraft {
        full_name: "Maria Souza".to_string(),
        whatsapp: "(11) 99999-8888".to_string(),
        instagram: "@mariasouza".to_string(),
        niche: "Estética".to_string(),
        revenue_range: REVENUE_RANGES[2].to_string(),
        biggest_challenge: "Escalar o time comercial".to_string(),
    }
}

pub fn test_settings() -> Settings {
    Settings {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        admin: AdminCredentials {
            email: TEST_ADMIN_EMAIL.to_string(),
            password_hash: bcrypt::hash(TEST_ADMIN_PASSWORD, 4).unwrap(),
        },
        database_url: ":memory:".to_string(),
        config_store_dir: PathBuf::from("unused"),
        local_store_capacity: 5 * 1024 * 1024,
        remote_config: None,
        openrouter_api_key: None,
        text_model: "test/model".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        frontend_url: None,
        sentry_dsn: None,
    }
}

pub struct TestState {
    pub remote: Arc<dyn RemoteConfigService>,
    pub text_generator: Arc<dyn TextGenerator>,
}

impl Default for TestState {
    fn default() -> Self {
        Self {
            remote: Arc::new(NullRemoteConfig),
            text_generator: Arc::new(DisabledGenerator),
        }
    }
}

impl TestState {
    pub fn build(self) -> Arc<AppState> {
        let pool = test_pool();
        Arc::new(AppState {
            lead_repository: Arc::new(LeadRepository::new(pool)),
            config_controller: Arc::new(ConfigController::new(
                Arc::new(MemoryConfigStore::default()),
                self.remote,
            )),
            text_generator: self.text_generator,
            http_client: outbound_client(OUTBOUND_TIMEOUT).expect("http client"),
            form_sessions: DashMap::new(),
            revoked_tokens: DashMap::new(),
            settings: test_settings(),
        })
    }
}

pub fn test_state() -> Arc<AppState> {
    TestState::default().build()
}

pub fn admin_token(state: &AppState) -> String {
    issue_token(&state.settings.admin.email, &state.settings.jwt_secret)
        .unwrap()
        .token
}

/// Runs one request through a fresh router and returns the status and JSON body (`Null` if not JSON).
pub async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}
