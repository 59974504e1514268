use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use stockroom_core::page::{FilterQuery, PageQuery};
use stockroom_core::provider::{CreateProvider, UpdateProvider};

use super::{data, done, to_error, unfiltered, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/providers", get(page_providers).post(create_provider))
        .route("/api/providers/all", get(list_providers))
        .route("/api/providers/filter", post(filter_providers))
        .route(
            "/api/providers/{id}",
            get(get_provider).put(update_provider).delete(delete_provider),
        )
        .route("/api/providers/{id}/invoices", get(provider_invoices))
}

async fn page_providers(State(state): State<AppState>, Query(page): Query<PageQuery>) -> ApiResult {
    state
        .service
        .page_providers(&unfiltered(page))
        .await
        .map(data)
        .map_err(to_error)
}

async fn filter_providers(
    State(state): State<AppState>,
    Json(query): Json<FilterQuery>,
) -> ApiResult {
    state
        .service
        .page_providers(&query)
        .await
        .map(data)
        .map_err(to_error)
}

async fn list_providers(State(state): State<AppState>) -> ApiResult {
    state.service.list_providers().await.map(data).map_err(to_error)
}

async fn get_provider(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.get_provider(id).await.map(data).map_err(to_error)
}

async fn provider_invoices(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state
        .service
        .list_provider_invoices(id)
        .await
        .map(data)
        .map_err(to_error)
}

async fn create_provider(
    State(state): State<AppState>,
    Json(input): Json<CreateProvider>,
) -> ApiResult {
    state
        .service
        .create_provider(&input)
        .await
        .map(|p| done(format!("provider {} saved", p.name), Some(p.id)))
        .map_err(to_error)
}

async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateProvider>,
) -> ApiResult {
    state
        .service
        .update_provider(id, &input)
        .await
        .map(|_| done(format!("provider {id} updated"), None))
        .map_err(to_error)
}

async fn delete_provider(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state
        .service
        .delete_provider(id)
        .await
        .map(|_| done(format!("provider {id} deleted"), None))
        .map_err(to_error)
}
