use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use stockroom_core::invoice::{CreateInvoice, UpdateInvoice};
use stockroom_core::page::{FilterQuery, PageQuery};

use super::{data, done, to_error, unfiltered, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", get(page_invoices).post(create_invoice))
        .route("/api/invoices/all", get(list_invoices))
        .route("/api/invoices/filter", post(filter_invoices))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
}

async fn page_invoices(State(state): State<AppState>, Query(page): Query<PageQuery>) -> ApiResult {
    state
        .service
        .page_invoices(&unfiltered(page))
        .await
        .map(data)
        .map_err(to_error)
}

async fn filter_invoices(State(state): State<AppState>, Json(query): Json<FilterQuery>) -> ApiResult {
    state
        .service
        .page_invoices(&query)
        .await
        .map(data)
        .map_err(to_error)
}

async fn list_invoices(State(state): State<AppState>) -> ApiResult {
    state.service.list_invoices().await.map(data).map_err(to_error)
}

async fn get_invoice(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state.service.get_invoice(id).await.map(data).map_err(to_error)
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(input): Json<CreateInvoice>,
) -> ApiResult {
    state
        .service
        .create_invoice(&input)
        .await
        .map(|i| done(format!("invoice {} saved", i.code), Some(i.id)))
        .map_err(to_error)
}

async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateInvoice>,
) -> ApiResult {
    state
        .service
        .update_invoice(id, &input)
        .await
        .map(|_| done(format!("invoice {id} updated"), None))
        .map_err(to_error)
}

async fn delete_invoice(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    state
        .service
        .delete_invoice(id)
        .await
        .map(|_| done(format!("invoice {id} deleted"), None))
        .map_err(to_error)
}
