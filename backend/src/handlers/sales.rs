//! HTTP handlers for sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Sale, SaleWithLines};
use crate::services::sales::{CreateSaleInput, DeleteSaleInput, SaleFilter, SalesService};
use crate::AppState;

/// Record a sale and take its units out of stock
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleWithLines>)> {
    check_permission(&current_user.0, Resource::Sale, Action::Create)?;
    let service = SalesService::new(state.db);
    let sale = service.create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<PaginatedResponse<Sale>>> {
    let service = SalesService::new(state.db);
    let sales = service.list(&filter).await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleWithLines>> {
    let service = SalesService::new(state.db);
    let sale = service.get(sale_id).await?;
    Ok(Json(sale))
}

/// Soft-delete a sale and return its units to stock
pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    input: Option<Json<DeleteSaleInput>>,
) -> AppResult<Json<SaleWithLines>> {
    check_permission(&current_user.0, Resource::Sale, Action::Delete)?;
    let reason = input.and_then(|Json(input)| input.reason);
    let service = SalesService::new(state.db);
    let sale = service
        .delete(current_user.0.user_id, sale_id, reason)
        .await?;
    Ok(Json(sale))
}
