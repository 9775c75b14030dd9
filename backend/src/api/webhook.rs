use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::api::lead_sink::{timestamp_now, LeadSink, SinkError, SinkKind};
use crate::models::lead_models::LeadDraft;

pub const LEAD_SOURCE: &str = "Landing Page";

/// Upper bound on any outbound call, so a silent endpoint cannot hold a form in `loading`.
pub const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared client for webhook deliveries and the remote config store.
pub fn outbound_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

#[derive(Serialize)]
pub struct WebhookPayload<'a> {
    #[serde(flatten)]
    pub lead: &'a LeadDraft,
    pub created_at: String,
    pub source: &'static str,
}

/// Posts leads to a user-configured URL (Zapier, Make, n8n...).
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl LeadSink for WebhookSink {
    async fn deliver(&self, lead: &LeadDraft) -> Result<(), SinkError> {
        let payload = WebhookPayload {
            lead,
            created_at: timestamp_now(),
            source: LEAD_SOURCE,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Lead webhook request failed: {}", e);
                SinkError::Request(e)
            })?;

        if !response.status().is_success() {
            error!("Lead webhook answered {}", response.status());
            return Err(SinkError::Status(response.status()));
        }

        info!("Lead delivered to webhook");
        Ok(())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Webhook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{filled_draft, spawn_server};
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    async fn capture(State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) {
        captured.lock().await.push((headers, body));
    }

    #[tokio::test]
    async fn test_posts_all_fields_with_timestamp_and_source() {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/hooks/lead", post(capture))
            .with_state(captured.clone());
        let base = spawn_server(app).await;

        let sink = WebhookSink::new(Client::new(), format!("{base}/hooks/lead"));
        sink.deliver(&filled_draft()).await.unwrap();

        let calls = captured.lock().await;
        assert_eq!(calls.len(), 1);
        let (headers, body) = &calls[0];
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("accept").unwrap(), "application/json");

        let draft = filled_draft();
        assert_eq!(body["full_name"], draft.full_name.as_str());
        assert_eq!(body["whatsapp"], draft.whatsapp.as_str());
        assert_eq!(body["instagram"], draft.instagram.as_str());
        assert_eq!(body["niche"], draft.niche.as_str());
        assert_eq!(body["revenue_range"], draft.revenue_range.as_str());
        assert_eq!(body["biggest_challenge"], draft.biggest_challenge.as_str());
        assert_eq!(body["source"], "Landing Page");
        assert!(body["created_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let app = Router::new().route(
            "/hooks/lead",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = spawn_server(app).await;

        let sink = WebhookSink::new(Client::new(), format!("{base}/hooks/lead"));
        let err = sink.deliver(&filled_draft()).await.unwrap_err();
        assert!(matches!(err, SinkError::Status(s) if s.as_u16() == 500));
        assert_eq!(err.user_message(), crate::api::lead_sink::WEBHOOK_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        let app = Router::new().route(
            "/hooks/lead",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                axum::http::StatusCode::OK
            }),
        );
        let base = spawn_server(app).await;

        let client = outbound_client(Duration::from_millis(200)).unwrap();
        let sink = WebhookSink::new(client, format!("{base}/hooks/lead"));
        let started = std::time::Instant::now();
        let err = sink.deliver(&filled_draft()).await.unwrap_err();

        assert!(matches!(&err, SinkError::Request(e) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = WebhookSink::new(Client::new(), format!("http://127.0.0.1:{port}/lead"));
        assert!(matches!(sink.deliver(&filled_draft()).await, Err(SinkError::Request(_))));
    }
}
