use std::sync::Arc;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::lead_sink::select_sink;
use crate::config::defaults::REVENUE_RANGES;
use crate::controllers::lead_form::{FormError, LeadFormController};
use crate::handlers::auth_middleware::AuthUser;
use crate::models::lead_models::{LeadField, LeadStatus};
use crate::AppState;

pub const MISSING_FIELDS_MESSAGE: &str = "Preencha todos os campos.";

type HandlerResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Deserialize)]
pub struct FieldChangeRequest {
    pub field: LeadField,
    pub value: String,
}

#[derive(Deserialize)]
pub struct LeadStatusRequest {
    pub status: LeadStatus,
}

fn session(state: &AppState, id: Uuid) -> Result<Arc<LeadFormController>, (StatusCode, Json<Value>)> {
    state
        .form_sessions
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Form session not found"})),
        ))
}

/// Opens a form session. Where its lead will go is fixed now, from the current config.
pub async fn create_form_session(State(state): State<Arc<AppState>>) -> HandlerResult {
    let config = state.config_controller.snapshot();
    let sink = select_sink(
        &config.integration.form_endpoint,
        &state.http_client,
        &state.lead_repository,
    );
    let form = Arc::new(LeadFormController::new(sink));
    let id = Uuid::new_v4();
    let snapshot = form.snapshot().await;
    state.form_sessions.insert(id, form);

    Ok(Json(json!({
        "id": id,
        "form": snapshot,
        "revenue_ranges": REVENUE_RANGES,
    })))
}

pub async fn get_form_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let form = session(&state, id)?;
    Ok(Json(json!(form.snapshot().await)))
}

pub async fn change_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<FieldChangeRequest>,
) -> HandlerResult {
    let form = session(&state, id)?;
    let snapshot = form.on_field_change(request.field, &request.value).await;
    Ok(Json(json!(snapshot)))
}

pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HandlerResult {
    let form = session(&state, id)?;
    let draft = form.snapshot().await.draft;

    let missing = draft.missing_fields();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|field| field.as_str()).collect();
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": MISSING_FIELDS_MESSAGE, "missing": names})),
        ));
    }
    if !REVENUE_RANGES.contains(&draft.revenue_range.as_str()) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "Faixa de faturamento inválida.", "missing": ["revenue_range"]})),
        ));
    }

    match form.submit().await {
        Ok(_) => Ok(Json(json!(form.snapshot().await))),
        Err(e @ FormError::SubmissionInProgress) => Err((
            StatusCode::CONFLICT,
            Json(json!({"error": e.to_string()})),
        )),
    }
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
) -> HandlerResult {
    let repository = state.lead_repository.clone();
    let leads = tokio::task::spawn_blocking(move || repository.list_leads())
        .await
        .map_err(|e| {
            error!("Lead listing task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Internal error"})))
        })?
        .map_err(|e| {
            error!("Failed to list leads: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": format!("Database error: {}", e)})))
        })?;
    Ok(Json(json!(leads)))
}

pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(lead_id): Path<i32>,
    Json(request): Json<LeadStatusRequest>,
) -> HandlerResult {
    let repository = state.lead_repository.clone();
    let status = request.status;
    let task = tokio::task::spawn_blocking(move || {
        if repository.update_status(lead_id, status)? {
            repository.find_by_id(lead_id)
        } else {
            Ok(None)
        }
    });
    let updated = task
        .await
        .map_err(|e| {
            error!("Lead status task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Internal error"})))
        })?
        .map_err(|e| {
            error!("Failed to update lead {}: {}", lead_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": format!("Database error: {}", e)})))
        })?;

    let Some(lead) = updated else {
        return Err((StatusCode::NOT_FOUND, Json(json!({"error": "Lead not found"}))));
    };
    info!("Lead {} marked as {}", lead_id, status.as_str());
    Ok(Json(json!(lead)))
}
