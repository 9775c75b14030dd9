//! Owner of the live [`SiteConfig`].
//!
//! Reads are lock-free snapshots out of a watch channel. Every change goes
//! through [`ConfigController::update`], which publishes first, then writes the
//! local copy, then tries the remote. Local truth wins: a failed remote write
//! only raises `save_error`, it never rolls the snapshot back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::remote_config::RemoteConfigService;
use crate::config::defaults::SITE_CONFIG_KEY;
use crate::models::site_config::SiteConfig;
use crate::repositories::config_store::LocalConfigStore;
use crate::utils::storage_usage::StorageUsage;

pub const REMOTE_SAVE_ERROR: &str = "Erro ao salvar na nuvem.";
pub const RESET_CONFIRMATION_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("no reset was requested")]
    NotRequested,
    #[error("reset confirmation token does not match")]
    TokenMismatch,
    #[error("reset confirmation expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResetToken {
    pub token: Uuid,
    pub expires_in_secs: u64,
}

/// Tells the client to throw away derived state and reload from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadDirective {
    pub reload: bool,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditorStatus {
    pub storage: StorageUsage,
    pub save_error: Option<String>,
    pub show_warning: bool,
    pub loaded: bool,
    pub revision: u64,
}

struct PendingReset {
    token: Uuid,
    expires_at: Instant,
}

pub struct ConfigController {
    current: watch::Sender<Arc<SiteConfig>>,
    save_error: watch::Sender<Option<String>>,
    pending_reset: Mutex<Option<PendingReset>>,
    revision: AtomicU64,
    loaded: AtomicBool,
    local: Arc<dyn LocalConfigStore>,
    remote: Arc<dyn RemoteConfigService>,
}

fn is_empty_document(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl ConfigController {
    /// Starts out holding the bundled default; call [`load`](Self::load) to pick up stored data.
    pub fn new(local: Arc<dyn LocalConfigStore>, remote: Arc<dyn RemoteConfigService>) -> Self {
        let (current, _) = watch::channel(Arc::new(SiteConfig::default()));
        let (save_error, _) = watch::channel(None);
        Self {
            current,
            save_error,
            pending_reset: Mutex::new(None),
            revision: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
            local,
            remote,
        }
    }

    pub fn snapshot(&self) -> Arc<SiteConfig> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SiteConfig>> {
        self.current.subscribe()
    }

    pub fn save_error(&self) -> Option<String> {
        self.save_error.borrow().clone()
    }

    pub fn dismiss_save_error(&self) {
        self.save_error.send_replace(None);
    }

    /// Bumped by every confirmed reset.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Remote first, then the local copy, then the bundled default. Never fails.
    pub async fn load(&self) -> Arc<SiteConfig> {
        let config = Arc::new(self.resolve().await);
        self.current.send_replace(config.clone());
        self.loaded.store(true, Ordering::SeqCst);
        config
    }

    async fn resolve(&self) -> SiteConfig {
        match self.remote.fetch().await {
            Ok(Some(doc)) if !is_empty_document(&doc) => match SiteConfig::from_partial(doc) {
                Ok(config) => {
                    info!("Loaded site config from remote");
                    return config;
                }
                Err(e) => warn!("Ignoring unusable remote site config: {}", e),
            },
            Ok(_) => debug!("Remote has no site config"),
            Err(e) => warn!("Remote site config unavailable, falling back to local copy: {}", e),
        }

        match self.local.get(SITE_CONFIG_KEY) {
            Ok(Some(text)) => {
                let parsed = serde_json::from_str::<Value>(&text).and_then(SiteConfig::from_partial);
                match parsed {
                    Ok(config) => {
                        info!("Loaded site config from local store");
                        return config;
                    }
                    Err(e) => warn!("Discarding unreadable local site config: {}", e),
                }
            }
            Ok(None) => debug!("No local site config stored"),
            Err(e) => warn!("Could not read local site config: {}", e),
        }

        info!("Using bundled default site config");
        SiteConfig::default()
    }

    /// Publishes `new` immediately, then persists it locally (best effort) and remotely.
    /// Returns the snapshot that was published.
    pub async fn update(&self, new: SiteConfig) -> Arc<SiteConfig> {
        let config = Arc::new(new.normalized());
        self.current.send_replace(config.clone());
        self.persist_locally(config.clone()).await;

        match self.remote.save(&config).await {
            Ok(()) => {
                self.save_error.send_replace(None);
            }
            Err(e) => {
                warn!("Failed to save site config to remote: {}", e);
                self.save_error.send_replace(Some(REMOTE_SAVE_ERROR.to_string()));
            }
        }
        config
    }

    /// Serializes and writes the local copy on the blocking pool.
    async fn persist_locally(&self, config: Arc<SiteConfig>) {
        let local = self.local.clone();
        let task = tokio::task::spawn_blocking(move || {
            let serialized = serde_json::to_string(config.as_ref())
                .map_err(|e| format!("could not serialize site config: {}", e))?;
            local
                .set(SITE_CONFIG_KEY, &serialized)
                .map_err(|e| e.to_string())
        });
        match task.await {
            Ok(Ok(())) => {}
            // the local copy is only a cache; the in-memory value stays authoritative
            Ok(Err(e)) => warn!("Local site config write skipped: {}", e),
            Err(e) => warn!("Local site config write task failed: {}", e),
        }
    }

    /// First step of a reset. Nothing changes until the token comes back through
    /// [`confirm_reset`](Self::confirm_reset).
    pub async fn request_reset(&self) -> ResetToken {
        let token = Uuid::new_v4();
        *self.pending_reset.lock().await = Some(PendingReset {
            token,
            expires_at: Instant::now() + RESET_CONFIRMATION_WINDOW,
        });
        info!("Site config reset requested");
        ResetToken {
            token,
            expires_in_secs: RESET_CONFIRMATION_WINDOW.as_secs(),
        }
    }

    pub async fn confirm_reset(&self, token: Uuid) -> Result<ReloadDirective, ResetError> {
        {
            let mut pending = self.pending_reset.lock().await;
            let request = pending.as_ref().ok_or(ResetError::NotRequested)?;
            if request.token != token {
                return Err(ResetError::TokenMismatch);
            }
            if Instant::now() > request.expires_at {
                pending.take();
                return Err(ResetError::Expired);
            }
            pending.take();
        }

        self.update(SiteConfig::default()).await;
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        info!(revision, "Site config reset to bundled default");
        Ok(ReloadDirective { reload: true, revision })
    }

    pub fn editor_status(&self) -> EditorStatus {
        let storage = StorageUsage::of(&self.snapshot());
        let save_error = self.save_error();
        EditorStatus {
            show_warning: storage.near_limit || save_error.is_some(),
            storage,
            save_error,
            loaded: self.is_loaded(),
            revision: self.revision(),
        }
    }
}
