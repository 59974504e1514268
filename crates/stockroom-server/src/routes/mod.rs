pub mod auth;
pub mod categories;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod providers;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::StatusCode, middleware, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use stockroom_core::page::{FilterQuery, PageQuery};
use stockroom_service::{AttachmentError, Completed, FailureKind, LocalService, ServiceError};

use crate::auth::{auth_middleware, AuthConfig};

pub struct InnerAppState {
    pub service: LocalService,
    pub auth: AuthConfig,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

pub type AppState = Arc<InnerAppState>;

pub(crate) type ApiError = (StatusCode, Json<Value>);
pub(crate) type ApiResult = Result<Json<Value>, ApiError>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(auth::routes());

    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(categories::routes())
        .merge(providers::routes())
        .merge(invoices::routes())
        .merge(inventory::routes())
        .merge(users::routes())
        .merge(uploads::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A plain page request is a filter request with an empty needle.
pub(crate) fn unfiltered(page: PageQuery) -> FilterQuery {
    FilterQuery {
        filter: String::new(),
        per_page: page.per_page,
        current_page: page.current_page,
    }
}

/// `{ "data": value }`
pub(crate) fn data<T: Serialize>(value: T) -> Json<Value> {
    Json(json!({ "data": value }))
}

/// `{ "done": true, "message": ..., "id"?: ... }`
pub(crate) fn done(message: impl Into<String>, id: Option<i64>) -> Json<Value> {
    let mut body = json!({ "done": true, "message": message.into() });
    if let Some(id) = id {
        body["id"] = json!(id);
    }
    Json(body)
}

pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "error": true, "message": message.into() })),
    )
}

/// The generic 500 shape used for faults the caller cannot act on.
pub(crate) fn infrastructure(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "errors": { "request": { "message": message.into(), "key": "request" } },
            "errorKeys": ["request"],
        })),
    )
}

pub(crate) fn to_error(e: ServiceError) -> ApiError {
    match e {
        ServiceError::NotFound(msg) => failure(StatusCode::NOT_FOUND, format!("{msg} not found")),
        ServiceError::InvalidInput(msg) => failure(StatusCode::BAD_REQUEST, msg),
        ServiceError::Conflict(msg) => failure(StatusCode::CONFLICT, msg),
        ServiceError::Unauthorized(msg) => failure(StatusCode::UNAUTHORIZED, msg),
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "request failed");
            infrastructure("the request could not be completed")
        }
    }
}

/// Render the outcome of an attachment operation.
pub(crate) fn completed(result: Result<Completed, AttachmentError>) -> ApiResult {
    let err = match result {
        Ok(c) => return Ok(done(c.message, c.item_id)),
        Err(err) => err,
    };

    if !err.is_domain() {
        tracing::error!(error = ?err, "attachment operation failed");
        return Err(infrastructure(err.message));
    }

    let status = match err.kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    tracing::warn!(kind = %err.kind, message = %err.message, "attachment operation refused");

    let mut body = json!({ "error": true, "message": err.message });
    if let Some(cleanup) = &err.cleanup {
        body["cleanup"] = json!({
            "message": cleanup.to_string(),
            "attempted": cleanup.attempted,
            "failed": cleanup.failed_names(),
        });
    }
    Err((status, Json(body)))
}
