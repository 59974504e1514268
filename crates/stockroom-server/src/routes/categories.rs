use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use stockroom_core::category::{CreateCategory, UpdateCategory};
use stockroom_core::page::{FilterQuery, PageQuery};

use super::{data, done, to_error, unfiltered, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(page_categories).post(create_category))
        .route("/api/categories/all", get(list_categories))
        .route("/api/categories/filter", post(filter_categories))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

async fn page_categories(State(state): State<AppState>, Query(page): Query<PageQuery>) -> ApiResult {
    state
        .service
        .page_categories(&unfiltered(page))
        .await
        .map(data)
        .map_err(to_error)
}

async fn filter_categories(
    State(state): State<AppState>,
    Json(query): Json<FilterQuery>,
) -> ApiResult {
    state
        .service
        .page_categories(&query)
        .await
        .map(data)
        .map_err(to_error)
}

async fn list_categories(State(state): State<AppState>) -> ApiResult {
    state.service.list_categories().await.map(data).map_err(to_error)
}

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.get_category(id).await.map(data).map_err(to_error)
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> ApiResult {
    state
        .service
        .create_category(&input)
        .await
        .map(|c| done(format!("category {} saved", c.name), Some(c.id)))
        .map_err(to_error)
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateCategory>,
) -> ApiResult {
    state
        .service
        .update_category(id, &input)
        .await
        .map(|_| done(format!("category {id} updated"), None))
        .map_err(to_error)
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state
        .service
        .delete_category(id)
        .await
        .map(|_| done(format!("category {id} deleted"), None))
        .map_err(to_error)
}
