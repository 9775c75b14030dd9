use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::handlers::auth_dtos::Claims;
use crate::AppState;

/// An admin holding a valid, unrevoked bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub token_id: String,
    pub expires_at: i64,
}

#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub message: String,
}

impl AuthError {
    fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

pub fn decode_claims(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .ok()
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| AuthError::unauthorized("No authorization token provided"))?;

        let claims = decode_claims(token, &state.settings.jwt_secret)
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;

        if state.revoked_tokens.contains_key(&claims.jti) {
            debug!("Rejected revoked token {}", claims.jti);
            return Err(AuthError::unauthorized("Session ended"));
        }

        Ok(AuthUser {
            email: claims.sub,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }
}
