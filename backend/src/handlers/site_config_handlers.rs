use std::sync::Arc;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::text_generation::{clean_suggestion, copywriter_prompt};
use crate::controllers::config_controller::ResetError;
use crate::handlers::auth_middleware::AuthUser;
use crate::models::site_config::{EditError, ImageSlot, SiteConfig, TextSlot};
use crate::utils::image_utils::{compress, ImageVariant};
use crate::AppState;

pub const IMAGE_ERROR_MESSAGE: &str = "Erro ao processar imagem. Tente uma menor.";
pub const STORAGE_FULL_MESSAGE: &str = "Armazenamento cheio. Remova imagens antes de enviar novas.";
pub const GENERATION_ERROR_MESSAGE: &str = "Erro ao gerar com IA. Verifique a API Key.";
pub const EXPORT_FILE_NAME: &str = "default_site_config.json";

type HandlerResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn fail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"error": message.into()})))
}

fn edit_error(e: EditError) -> (StatusCode, Json<Value>) {
    match e {
        EditError::GalleryIndexOutOfRange { .. } => fail(StatusCode::NOT_FOUND, e.to_string()),
        EditError::InvalidColor(_) | EditError::InvalidEndpoint => {
            fail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

/// Publishes `config` and answers with the new snapshot plus the remote save outcome.
async fn apply(state: &AppState, config: SiteConfig) -> HandlerResult {
    let published = state.config_controller.update(config).await;
    Ok(Json(json!({
        "config": &*published,
        "save_error": state.config_controller.save_error(),
    })))
}

#[derive(Deserialize)]
pub struct ValueRequest {
    pub value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRequest {
    pub form_endpoint: String,
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub token: Uuid,
}

pub async fn get_site_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    let controller = &state.config_controller;
    Json(json!({
        "config": &*controller.snapshot(),
        "revision": controller.revision(),
    }))
}

pub async fn get_editor_status(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
) -> HandlerResult {
    let status = state.config_controller.editor_status();
    Ok(Json(json!(status)))
}

pub async fn dismiss_save_error(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
) -> HandlerResult {
    state.config_controller.dismiss_save_error();
    Ok(Json(json!({"save_error": null})))
}

pub async fn update_text(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(slot): Path<TextSlot>,
    Json(request): Json<ValueRequest>,
) -> HandlerResult {
    let next = state.config_controller.snapshot().with_text(slot, request.value);
    apply(&state, next).await
}

pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(slot): Path<TextSlot>,
) -> HandlerResult {
    let suggestion = match state.text_generator.generate(&copywriter_prompt(slot)).await {
        Ok(raw) => clean_suggestion(&raw),
        Err(e) => {
            error!("Text generation failed for {:?}: {}", slot, e);
            None
        }
    };
    let Some(text) = suggestion else {
        let current = state.config_controller.snapshot();
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": GENERATION_ERROR_MESSAGE, "text": current.text(slot)})),
        ));
    };

    info!("Applying generated copy to {:?}", slot);
    let next = state.config_controller.snapshot().with_text(slot, text);
    apply(&state, next).await
}

pub async fn update_primary_color(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Json(request): Json<ValueRequest>,
) -> HandlerResult {
    let next = state
        .config_controller
        .snapshot()
        .with_primary_color(&request.value)
        .map_err(edit_error)?;
    apply(&state, next).await
}

pub async fn update_integration(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Json(request): Json<IntegrationRequest>,
) -> HandlerResult {
    let next = state
        .config_controller
        .snapshot()
        .with_form_endpoint(&request.form_endpoint)
        .map_err(edit_error)?;
    apply(&state, next).await
}

/// Reads the first multipart field with content, gates on storage, and compresses it off the async pool.
async fn compressed_upload(
    state: &AppState,
    mut multipart: Multipart,
    variant: ImageVariant,
) -> Result<String, (StatusCode, Json<Value>)> {
    if !state.config_controller.editor_status().storage.uploads_allowed {
        warn!("Upload refused, storage is full");
        return Err(fail(StatusCode::INSUFFICIENT_STORAGE, STORAGE_FULL_MESSAGE));
    }

    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed upload: {}", e);
        fail(StatusCode::BAD_REQUEST, IMAGE_ERROR_MESSAGE)
    })? {
        let data = field.bytes().await.map_err(|e| {
            warn!("Could not read upload: {}", e);
            fail(StatusCode::BAD_REQUEST, IMAGE_ERROR_MESSAGE)
        })?;
        if !data.is_empty() {
            bytes = Some(data);
            break;
        }
    }
    let bytes = bytes.ok_or_else(|| fail(StatusCode::BAD_REQUEST, "No file uploaded"))?;

    tokio::task::spawn_blocking(move || compress(&bytes, variant))
        .await
        .map_err(|e| {
            error!("Image task failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, IMAGE_ERROR_MESSAGE)
        })?
        .map_err(|e| {
            warn!("Rejected upload: {}", e);
            fail(StatusCode::UNPROCESSABLE_ENTITY, IMAGE_ERROR_MESSAGE)
        })
}

pub async fn upload_slot_image(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(slot): Path<ImageSlot>,
    multipart: Multipart,
) -> HandlerResult {
    let image = compressed_upload(&state, multipart, ImageVariant::Hero).await?;
    let next = state.config_controller.snapshot().with_image(slot, image);
    apply(&state, next).await
}

pub async fn upload_gallery_image(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    multipart: Multipart,
) -> HandlerResult {
    let image = compressed_upload(&state, multipart, ImageVariant::Gallery).await?;
    let next = state.config_controller.snapshot().with_gallery_image(image);
    apply(&state, next).await
}

pub async fn remove_gallery_image(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(index): Path<usize>,
) -> HandlerResult {
    let next = state
        .config_controller
        .snapshot()
        .without_gallery_image(index)
        .map_err(edit_error)?;
    apply(&state, next).await
}

pub async fn export_config(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let snapshot = state.config_controller.snapshot().to_snapshot().map_err(|e| {
        error!("Could not serialize site config: {}", e);
        fail(StatusCode::INTERNAL_SERVER_ERROR, "Export failed")
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        snapshot,
    ))
}

pub async fn import_config(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Json(document): Json<Value>,
) -> HandlerResult {
    if !document.is_object() {
        return Err(fail(StatusCode::UNPROCESSABLE_ENTITY, "Snapshot must be a JSON object"));
    }
    let config = SiteConfig::from_partial(document).map_err(|e| {
        fail(StatusCode::UNPROCESSABLE_ENTITY, format!("Invalid snapshot: {}", e))
    })?;
    info!("Importing site config snapshot");
    apply(&state, config).await
}

pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
) -> HandlerResult {
    let token = state.config_controller.request_reset().await;
    Ok(Json(json!(token)))
}

pub async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Json(request): Json<ResetConfirmRequest>,
) -> HandlerResult {
    match state.config_controller.confirm_reset(request.token).await {
        Ok(directive) => Ok(Json(json!(directive))),
        Err(e @ ResetError::Expired) => Err(fail(StatusCode::GONE, e.to_string())),
        Err(e) => Err(fail(StatusCode::CONFLICT, e.to_string())),
    }
}
