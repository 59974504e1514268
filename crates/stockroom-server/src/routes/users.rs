use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use stockroom_core::page::{FilterQuery, PageQuery};
use stockroom_core::user::{CreateUser, ResetPassword, UpdateUser};

use super::{data, done, to_error, unfiltered, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(page_users).post(create_user))
        .route("/api/users/filter", post(filter_users))
        .route("/api/users/password", put(reset_password))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/roles", get(list_roles))
        .route("/api/user-statuses", get(list_user_statuses))
}

async fn page_users(State(state): State<AppState>, Query(page): Query<PageQuery>) -> ApiResult {
    state
        .service
        .page_users(&unfiltered(page))
        .await
        .map(data)
        .map_err(to_error)
}

async fn filter_users(State(state): State<AppState>, Json(query): Json<FilterQuery>) -> ApiResult {
    state.service.page_users(&query).await.map(data).map_err(to_error)
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.get_user(id).await.map(data).map_err(to_error)
}

async fn create_user(State(state): State<AppState>, Json(input): Json<CreateUser>) -> ApiResult {
    state
        .service
        .create_user(&input)
        .await
        .map(|u| done(format!("user {} saved", u.username), Some(u.id)))
        .map_err(to_error)
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateUser>,
) -> ApiResult {
    state
        .service
        .update_user(id, &input)
        .await
        .map(|_| done(format!("user {id} updated"), None))
        .map_err(to_error)
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state
        .service
        .delete_user(id)
        .await
        .map(|_| done(format!("user {id} deleted"), None))
        .map_err(to_error)
}

async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPassword>,
) -> ApiResult {
    state
        .service
        .reset_password(&input)
        .await
        .map(|_| done("password updated", None))
        .map_err(to_error)
}

async fn list_roles(State(state): State<AppState>) -> ApiResult {
    state.service.list_roles().await.map(data).map_err(to_error)
}

async fn list_user_statuses(State(state): State<AppState>) -> ApiResult {
    state
        .service
        .list_user_statuses()
        .await
        .map(data)
        .map_err(to_error)
}
