use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use crate::api::lead_sink::{LeadSink, SinkKind};
use crate::models::lead_models::{LeadDraft, LeadField};
use crate::utils::format_utils::format_phone_number;

/// How long the success confirmation stays up before the form clears itself.
pub const SUCCESS_DISPLAY_DELAY: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("a submission is already in progress")]
    SubmissionInProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSnapshot {
    pub draft: LeadDraft,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
    pub destination: SinkKind,
}

struct FormState {
    draft: LeadDraft,
    status: SubmissionStatus,
    error_message: Option<String>,
    // bumped on each success so an older clear timer can tell it is stale
    success_epoch: u64,
    last_activity: Instant,
}

/// One visitor's lead form: the draft, where it will be delivered, and the
/// idle -> loading -> success|error cycle.
pub struct LeadFormController {
    sink: Arc<dyn LeadSink>,
    state: Arc<Mutex<FormState>>,
    success_delay: Duration,
}

impl LeadFormController {
    pub fn new(sink: Arc<dyn LeadSink>) -> Self {
        Self::with_success_delay(sink, SUCCESS_DISPLAY_DELAY)
    }

    pub fn with_success_delay(sink: Arc<dyn LeadSink>, success_delay: Duration) -> Self {
        Self {
            sink,
            state: Arc::new(Mutex::new(FormState {
                draft: LeadDraft::default(),
                status: SubmissionStatus::Idle,
                error_message: None,
                success_epoch: 0,
                last_activity: Instant::now(),
            })),
            success_delay,
        }
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        let state = self.state.lock().await;
        FormSnapshot {
            draft: state.draft.clone(),
            status: state.status,
            error_message: state.error_message.clone(),
            destination: self.sink.kind(),
        }
    }

    pub async fn idle_for(&self) -> Duration {
        self.state.lock().await.last_activity.elapsed()
    }

    /// Stores a field as typed, except the phone which is re-masked on every keystroke.
    pub async fn on_field_change(&self, field: LeadField, raw_value: &str) -> FormSnapshot {
        let value = match field {
            LeadField::Whatsapp => format_phone_number(raw_value),
            _ => raw_value.to_string(),
        };
        {
            let mut state = self.state.lock().await;
            state.draft.set(field, value);
            state.last_activity = Instant::now();
        }
        self.snapshot().await
    }

    /// Delivers the current draft. Required fields are checked by the caller.
    ///
    /// On success the draft stays visible for the display delay and is then
    /// cleared. On failure it is kept as-is so the visitor can retry.
    pub async fn submit(&self) -> Result<SubmissionStatus, FormError> {
        let draft = {
            let mut state = self.state.lock().await;
            if state.status == SubmissionStatus::Loading {
                return Err(FormError::SubmissionInProgress);
            }
            state.status = SubmissionStatus::Loading;
            state.error_message = None;
            state.last_activity = Instant::now();
            state.draft.clone()
        };

        match self.sink.deliver(&draft).await {
            Ok(()) => {
                let epoch = {
                    let mut state = self.state.lock().await;
                    state.status = SubmissionStatus::Success;
                    state.success_epoch += 1;
                    state.success_epoch
                };
                info!(destination = ?self.sink.kind(), "Lead submitted");
                self.schedule_clear(epoch);
                Ok(SubmissionStatus::Success)
            }
            Err(e) => {
                error!(destination = ?self.sink.kind(), "Lead submission failed: {}", e);
                let mut state = self.state.lock().await;
                state.status = SubmissionStatus::Error;
                state.error_message = Some(e.user_message().to_string());
                Ok(SubmissionStatus::Error)
            }
        }
    }

    fn schedule_clear(&self, epoch: u64) {
        let state = self.state.clone();
        let delay = self.success_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock().await;
            if state.status == SubmissionStatus::Success && state.success_epoch == epoch {
                state.draft = LeadDraft::default();
                state.status = SubmissionStatus::Idle;
            }
        });
    }
}
