use std::sync::Arc;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::webhook::WebhookSink;
use crate::models::lead_models::{LeadDraft, NewLead};
use crate::repositories::lead_repository::{LeadRepository, RepositoryError};

pub const DATASTORE_FAILURE_MESSAGE: &str = "Erro ao salvar no banco de dados.";
pub const WEBHOOK_FAILURE_MESSAGE: &str = "Erro de conexão. Verifique sua internet ou tente novamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Webhook,
    Datastore,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook answered {0}")]
    Status(reqwest::StatusCode),
    #[error("datastore insert failed: {0}")]
    Datastore(#[from] RepositoryError),
    #[error("datastore task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SinkError {
    /// Message shown under the form.
    pub fn user_message(&self) -> &'static str {
        match self {
            SinkError::Request(_) | SinkError::Status(_) => WEBHOOK_FAILURE_MESSAGE,
            SinkError::Datastore(_) | SinkError::Task(_) => DATASTORE_FAILURE_MESSAGE,
        }
    }
}

/// Where a submitted lead ends up. Delivery is attempted once; no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn deliver(&self, lead: &LeadDraft) -> Result<(), SinkError>;
    fn kind(&self) -> SinkKind;
}

/// ISO-8601 UTC with milliseconds, e.g. `2025-01-10T14:03:22.512Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct DatastoreSink {
    repository: Arc<LeadRepository>,
}

impl DatastoreSink {
    pub fn new(repository: Arc<LeadRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl LeadSink for DatastoreSink {
    async fn deliver(&self, lead: &LeadDraft) -> Result<(), SinkError> {
        let repository = self.repository.clone();
        let new_lead = NewLead::from_draft(lead, timestamp_now());
        tokio::task::spawn_blocking(move || repository.create_lead(&new_lead)).await??;
        info!("Lead stored in datastore");
        Ok(())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Datastore
    }
}

/// A non-blank endpoint routes to the webhook, anything else to the datastore.
pub fn select_sink(
    form_endpoint: &str,
    http_client: &reqwest::Client,
    repository: &Arc<LeadRepository>,
) -> Arc<dyn LeadSink> {
    let endpoint = form_endpoint.trim();
    if endpoint.is_empty() {
        Arc::new(DatastoreSink::new(repository.clone()))
    } else {
        Arc::new(WebhookSink::new(http_client.clone(), endpoint.to_string()))
    }
}
