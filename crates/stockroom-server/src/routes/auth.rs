use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use stockroom_service::ServiceError;

use super::{data, done, failure, to_error, ApiResult, AppState};
use crate::auth::{bearer_token, generate_session_token, sha256_hex};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/auth", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/api/auth", delete(logout))
}

async fn login(State(state): State<AppState>, Json(input): Json<LoginRequest>) -> ApiResult {
    let user = state
        .service
        .verify_credentials(input.username.trim(), &input.password)
        .await
        .map_err(|e| {
            if matches!(e, ServiceError::Unauthorized(_)) {
                tracing::info!(username = %input.username, "login refused");
            }
            to_error(e)
        })?;

    let db = state.service.db();
    let now = Utc::now();
    if let Err(e) = db.purge_expired_sessions(now).await {
        tracing::warn!(error = %e, "could not purge expired sessions");
    }

    let token = generate_session_token();
    db.create_session(user.id, &sha256_hex(&token), now + state.auth.session_ttl)
        .await
        .map_err(|e| to_error(e.into()))?;

    tracing::info!(user_id = user.id, "session opened");
    Ok(data(json!({
        "name": user.name,
        "lastname": user.lastname,
        "role": user.role_id,
        "roleName": user.role_name,
        "token": token,
    })))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let token = bearer_token(&headers)
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "no session token supplied"))?;

    state
        .service
        .db()
        .delete_session(&sha256_hex(token))
        .await
        .map_err(|e| to_error(e.into()))?;
    Ok(done("session closed", None))
}
