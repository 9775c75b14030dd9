use std::sync::Arc;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::auth_dtos::{Claims, LoginRequest, LoginResponse};
use crate::handlers::auth_middleware::AuthUser;
use crate::AppState;

pub const LOGIN_FAILED_MESSAGE: &str = "Credenciais inválidas ou erro de conexão.";
pub const SESSION_HOURS: i64 = 12;

fn login_failed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": LOGIN_FAILED_MESSAGE})),
    )
}

pub fn issue_token(email: &str, secret: &str) -> Result<LoginResponse, (StatusCode, Json<Value>)> {
    let expires_at = (Utc::now() + Duration::hours(SESSION_HOURS)).timestamp();
    let claims = Claims {
        sub: email.to_string(),
        exp: expires_at,
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    ).map_err(|_| (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Token generation failed"}))
    ))?;
    Ok(LoginResponse { token, expires_at })
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(login_req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<Value>)> {
    let admin = &state.settings.admin;
    if !login_req.email.trim().eq_ignore_ascii_case(&admin.email) {
        warn!("Login attempt for unknown email");
        return Err(login_failed());
    }

    match bcrypt::verify(&login_req.password, &admin.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Login attempt with wrong password");
            return Err(login_failed());
        }
        Err(e) => {
            warn!("Could not verify admin password hash: {}", e);
            return Err(login_failed());
        }
    }

    let response = issue_token(&admin.email, &state.settings.jwt_secret)?;
    info!("Admin signed in");
    Ok(Json(response))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Json<Value> {
    state.revoked_tokens.insert(auth_user.token_id, auth_user.expires_at);
    info!("Admin signed out");
    Json(json!({"message": "Signed out"}))
}

pub async fn session(auth_user: AuthUser) -> Json<Value> {
    Json(json!({
        "email": auth_user.email,
        "expires_at": auth_user.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{call, empty_request, json_request, test_state, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD};

    fn login_request(email: &str, password: &str) -> axum::http::Request<axum::body::Body> {
        json_request("POST", "/api/auth/login", None, json!({"email": email, "password": password}))
    }

    #[tokio::test]
    async fn test_login_with_valid_credentials_returns_token() {
        let state = test_state();
        let (status, body) = call(&state, login_request(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(body["expires_at"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_login_failure_has_single_message() {
        let state = test_state();
        for (email, password) in [(TEST_ADMIN_EMAIL, "errada"), ("outra@nghub.test", TEST_ADMIN_PASSWORD)] {
            let (status, body) = call(&state, login_request(email, password)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], LOGIN_FAILED_MESSAGE);
        }
        assert!(state.revoked_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_logout_revokes_the_token() {
        let state = test_state();
        let (_, body) = call(&state, login_request(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)).await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(&state, empty_request("GET", "/api/auth/session", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], TEST_ADMIN_EMAIL);

        let (status, _) = call(&state, empty_request("POST", "/api/auth/logout", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&state, empty_request("GET", "/api/auth/session", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_need_a_valid_token() {
        let state = test_state();
        let (status, _) = call(&state, empty_request("GET", "/api/admin/status", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&state, empty_request("GET", "/api/admin/status", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let foreign = issue_token(TEST_ADMIN_EMAIL, "some-other-secret").unwrap().token;
        let (status, _) = call(&state, empty_request("GET", "/api/admin/status", Some(&foreign))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
