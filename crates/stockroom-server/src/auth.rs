use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::routes::AppState;

/// Authentication settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// When false every route is open; login still issues tokens.
    pub required: bool,
    /// How long a session token stays valid after login.
    pub session_ttl: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: true,
            session_ttl: chrono::Duration::hours(12),
        }
    }
}

/// The session behind an authenticated request, stored in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser {
    pub user_id: i64,
}

/// SHA-256 hash a raw token, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a new session token: `sr_` + 43 chars of base62-encoded random bytes.
pub fn generate_session_token() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random_part: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62.len());
            BASE62[idx] as char
        })
        .collect();
    format!("sr_{random_part}")
}

/// Pull the raw token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware that enforces authentication.
///
/// With `required` off all requests pass through. Otherwise the bearer
/// token must match an unexpired session.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.auth.required {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()) else {
        return unauthorized("missing or invalid session token");
    };
    let token_hash = sha256_hex(token);

    match state.service.db().find_session(&token_hash).await {
        Ok(Some(session)) if !session.is_expired(Utc::now()) => {
            request.extensions_mut().insert(SessionUser {
                user_id: session.user_id,
            });
            next.run(request).await
        }
        Ok(Some(_)) => unauthorized("session expired"),
        Ok(None) => unauthorized("missing or invalid session token"),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            crate::routes::infrastructure("session could not be verified").into_response()
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": true, "message": message })),
    )
        .into_response()
}
