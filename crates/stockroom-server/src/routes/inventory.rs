use std::future::Future;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::page::{FilterQuery, PageQuery};

use super::{completed, data, infrastructure, to_error, unfiltered, ApiResult, AppState};
use crate::upload::InventoryForm;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/inventory", get(page_items).post(create_item))
        .route("/api/inventory/filter", post(filter_items))
        .route(
            "/api/inventory/{id}",
            get(get_item).put(update_item).delete(remove_item),
        )
        .route("/api/inventory/{id}/images", get(item_images))
}

async fn page_items(State(state): State<AppState>, Query(page): Query<PageQuery>) -> ApiResult {
    state
        .service
        .page_items(&unfiltered(page))
        .await
        .map(data)
        .map_err(to_error)
}

async fn filter_items(State(state): State<AppState>, Json(query): Json<FilterQuery>) -> ApiResult {
    state.service.page_items(&query).await.map(data).map_err(to_error)
}

async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.get_item(id).await.map(data).map_err(to_error)
}

async fn item_images(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.item_images(id).await.map(data).map_err(to_error)
}

/// Run an attachment operation on its own task.
///
/// A client that disconnects drops the handler future; the operation still
/// finishes or rolls back as a whole instead of stopping between its
/// database and file steps.
async fn detached<F>(work: F) -> ApiResult
where
    F: Future<Output = ApiResult> + Send + 'static,
{
    tokio::spawn(work).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "attachment task failed");
        Err(infrastructure("the request could not be completed"))
    })
}

async fn create_item(State(state): State<AppState>, multipart: Multipart) -> ApiResult {
    detached(async move {
        let files = state.service.files();
        let form = InventoryForm::read(files, multipart).await?;
        let fields = match form.create_fields() {
            Ok(fields) => fields,
            Err(message) => return Err(form.reject(files, StatusCode::BAD_REQUEST, message).await),
        };
        completed(state.service.create_item(&fields, &form.uploads).await)
    })
    .await
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult {
    detached(async move {
        let files = state.service.files();
        let form = InventoryForm::read(files, multipart).await?;
        let fields = match form.update_fields() {
            Ok(fields) => fields,
            Err(message) => return Err(form.reject(files, StatusCode::BAD_REQUEST, message).await),
        };
        completed(state.service.update_item(id, &fields, &form.uploads).await)
    })
    .await
}

async fn remove_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    detached(async move { completed(state.service.remove_item(id).await) }).await
}
