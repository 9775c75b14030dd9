use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::AppState;

/// Form sessions untouched for longer than this are dropped by the sweep.
pub const FORM_SESSION_MAX_IDLE: Duration = Duration::from_secs(60 * 60);

/// Removes idle lead form sessions and revoked tokens that have expired anyway.
/// Returns how many form sessions were dropped.
pub async fn sweep(state: &AppState, max_idle: Duration) -> usize {
    let sessions: Vec<_> = state
        .form_sessions
        .iter()
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();

    let mut stale: Vec<Uuid> = Vec::new();
    for (id, form) in sessions {
        if form.idle_for().await > max_idle {
            stale.push(id);
        }
    }
    for id in &stale {
        state.form_sessions.remove(id);
    }

    let now = Utc::now().timestamp();
    state.revoked_tokens.retain(|_, expires_at| *expires_at > now);

    stale.len()
}

pub async fn start_scheduler(state: Arc<AppState>) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;

    // Every 10 minutes, clear out abandoned form sessions
    let state_clone = Arc::clone(&state);
    let sweep_job = Job::new_async("0 */10 * * * *", move |_, _| {
        let state = state_clone.clone();
        Box::pin(async move {
            let dropped = sweep(&state, FORM_SESSION_MAX_IDLE).await;
            if dropped > 0 {
                info!("Dropped {} idle lead form sessions", dropped);
            } else {
                debug!("No idle lead form sessions to drop");
            }
        })
    })?;
    sched.add(sweep_job).await?;

    sched.start().await?;
    info!("Scheduler started");
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::lead_sink::{LeadSink, MockLeadSink, SinkKind};
    use crate::controllers::lead_form::LeadFormController;
    use crate::models::lead_models::LeadField;
    use crate::test_support::test_state;

    fn form() -> Arc<LeadFormController> {
        let mut sink = MockLeadSink::new();
        sink.expect_kind().return_const(SinkKind::Datastore);
        let sink: Arc<dyn LeadSink> = Arc::new(sink);
        Arc::new(LeadFormController::new(sink))
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_only_idle_sessions() {
        let state = test_state();
        let (idle_id, busy_id) = (Uuid::new_v4(), Uuid::new_v4());
        state.form_sessions.insert(idle_id, form());
        state.form_sessions.insert(busy_id, form());

        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        let busy = state.form_sessions.get(&busy_id).unwrap().value().clone();
        busy.on_field_change(LeadField::FullName, "Ana").await;
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(sweep(&state, FORM_SESSION_MAX_IDLE).await, 1);
        assert!(!state.form_sessions.contains_key(&idle_id));
        assert!(state.form_sessions.contains_key(&busy_id));
    }

    #[tokio::test]
    async fn test_sweep_forgets_expired_revocations() {
        let state = test_state();
        let now = Utc::now().timestamp();
        state.revoked_tokens.insert("old".to_string(), now - 10);
        state.revoked_tokens.insert("live".to_string(), now + 3600);

        sweep(&state, FORM_SESSION_MAX_IDLE).await;

        assert!(!state.revoked_tokens.contains_key("old"));
        assert!(state.revoked_tokens.contains_key("live"));
    }
}
