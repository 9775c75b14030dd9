use dotenvy::dotenv;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use anyhow::Context;
use dashmap::DashMap;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use std::sync::Arc;
use uuid::Uuid;

mod handlers {
    pub mod auth_dtos;
    pub mod auth_handlers;
    pub mod auth_middleware;
    pub mod lead_handlers;
    pub mod site_config_handlers;
}
mod api {
    pub mod lead_sink;
    pub mod remote_config;
    pub mod text_generation;
    pub mod webhook;
}
mod config {
    pub mod defaults;
    pub mod settings;
}
mod controllers {
    pub mod config_controller;
    pub mod lead_form;
}
mod models {
    pub mod lead_models;
    pub mod site_config;
}
mod repositories {
    pub mod config_store;
    pub mod lead_repository;
}
mod utils {
    pub mod format_utils;
    pub mod image_utils;
    pub mod storage_usage;
}
mod schema;
mod jobs {
    pub mod scheduler;
}
#[cfg(test)]
mod test_support;

use api::remote_config::{HttpRemoteConfig, NullRemoteConfig, RemoteConfigService};
use api::text_generation::{DisabledGenerator, OpenRouterGenerator, TextGenerator};
use config::settings::Settings;
use controllers::config_controller::ConfigController;
use controllers::lead_form::LeadFormController;
use repositories::config_store::FileConfigStore;
use repositories::lead_repository::LeadRepository;
use utils::storage_usage::{StorageUsage, STORAGE_LIMIT_BYTES};

use handlers::auth_handlers;
use handlers::lead_handlers;
use handlers::site_config_handlers;

type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Room for a phone photo before it is compressed.
const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Any exported snapshot the storage gate allowed must fit back through import.
const SNAPSHOT_BODY_LIMIT: usize = STORAGE_LIMIT_BYTES + 1024 * 1024;

async fn health_check() -> &'static str {
    "OK"
}

pub struct AppState {
    lead_repository: Arc<LeadRepository>,
    config_controller: Arc<ConfigController>,
    text_generator: Arc<dyn TextGenerator>,
    http_client: reqwest::Client,
    form_sessions: DashMap<Uuid, Arc<LeadFormController>>,
    revoked_tokens: DashMap<String, i64>, // token id -> expiry (unix seconds)
    settings: Settings,
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = match frontend_url.and_then(|url| url.parse::<axum::http::HeaderValue>().ok()) {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::OPTIONS,
            axum::http::Method::DELETE,
        ])
        .allow_origin(origin)
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
        .expose_headers([axum::http::header::CONTENT_TYPE, axum::http::header::CONTENT_DISPOSITION])
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_routes = Router::new()
        .route("/api/admin/images/gallery", post(site_config_handlers::upload_gallery_image))
        .route("/api/admin/images/{slot}", post(site_config_handlers::upload_slot_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));
    let snapshot_routes = Router::new()
        .route("/api/admin/config/import", post(site_config_handlers::import_config))
        .layer(DefaultBodyLimit::max(SNAPSHOT_BODY_LIMIT));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/site-config", get(site_config_handlers::get_site_config))

        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/session", get(auth_handlers::session))

        .route("/api/lead-form", post(lead_handlers::create_form_session))
        .route("/api/lead-form/{id}", get(lead_handlers::get_form_session))
        .route("/api/lead-form/{id}/fields", patch(lead_handlers::change_field))
        .route("/api/lead-form/{id}/submit", post(lead_handlers::submit_form))

        .route("/api/admin/status", get(site_config_handlers::get_editor_status))
        .route("/api/admin/save-error", delete(site_config_handlers::dismiss_save_error))
        .route("/api/admin/texts/{slot}", put(site_config_handlers::update_text))
        .route("/api/admin/texts/{slot}/generate", post(site_config_handlers::generate_text))
        .route("/api/admin/colors/primary", put(site_config_handlers::update_primary_color))
        .route("/api/admin/integration", put(site_config_handlers::update_integration))
        .route("/api/admin/images/gallery/{index}", delete(site_config_handlers::remove_gallery_image))
        .route("/api/admin/config/export", get(site_config_handlers::export_config))
        .route("/api/admin/config/reset", post(site_config_handlers::request_reset))
        .route("/api/admin/config/reset/confirm", post(site_config_handlers::confirm_reset))

        .route("/api/admin/leads", get(lead_handlers::list_leads))
        .route("/api/admin/leads/{id}/status", patch(lead_handlers::update_lead_status))

        .merge(upload_routes)
        .merge(snapshot_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(cors_layer(state.settings.frontend_url.as_deref()))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let settings = Settings::from_env().context("invalid environment")?;

    let _guard = settings.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((dsn, sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        }))
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Set up database connection pool
    let manager = ConnectionManager::<SqliteConnection>::new(settings.database_url.as_str());
    let pool: DbPool = r2d2::Pool::builder()
        .build(manager)
        .context("failed to create pool")?;
    {
        let mut conn = pool.get().context("failed to get DB connection")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;
    }

    let http_client = api::webhook::outbound_client(api::webhook::OUTBOUND_TIMEOUT)
        .context("failed to build HTTP client")?;

    let local_store = Arc::new(
        FileConfigStore::new(&settings.config_store_dir, settings.local_store_capacity)
            .context("failed to open local config store")?,
    );
    let remote: Arc<dyn RemoteConfigService> = match &settings.remote_config {
        Some(remote) => {
            info!("Remote site config enabled at {}", remote.url);
            Arc::new(HttpRemoteConfig::new(http_client.clone(), remote.url.clone(), remote.api_key.clone()))
        }
        None => Arc::new(NullRemoteConfig),
    };
    let config_controller = Arc::new(ConfigController::new(local_store, remote));
    config_controller.load().await;

    let mut config_changes = config_controller.subscribe();
    tokio::spawn(async move {
        while config_changes.changed().await.is_ok() {
            let usage = StorageUsage::of(&config_changes.borrow_and_update());
            info!(percent = usage.percent, bytes = usage.bytes, "Site config published");
        }
    });

    let text_generator: Arc<dyn TextGenerator> = match &settings.openrouter_api_key {
        Some(key) => match OpenRouterGenerator::new(key.clone(), settings.text_model.clone()) {
            Ok(generator) => Arc::new(generator),
            Err(e) => {
                warn!("AI copy suggestions disabled: {}", e);
                Arc::new(DisabledGenerator)
            }
        },
        None => {
            info!("OPENROUTER_API_KEY not set, AI copy suggestions disabled");
            Arc::new(DisabledGenerator)
        }
    };

    let state = Arc::new(AppState {
        lead_repository: Arc::new(LeadRepository::new(pool)),
        config_controller,
        text_generator,
        http_client,
        form_sessions: DashMap::new(),
        revoked_tokens: DashMap::new(),
        settings,
    });

    let _scheduler = jobs::scheduler::start_scheduler(state.clone())
        .await
        .context("failed to start scheduler")?;

    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", state.settings.bind_addr))?;
    info!("Listening on {}", state.settings.bind_addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
