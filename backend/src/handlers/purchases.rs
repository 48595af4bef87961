//! HTTP handlers for raw material purchases

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Purchase, PurchaseWithLines};
use crate::services::purchases::{
    CancelPurchaseInput, CreatePurchaseInput, PurchaseFilter, PurchaseService,
};
use crate::AppState;

/// Record a purchase, adding stock and re-averaging unit costs
pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseWithLines>)> {
    check_permission(&current_user.0, Resource::Purchase, Action::Create)?;
    let service = PurchaseService::new(state.db);
    let purchase = service.create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<PurchaseFilter>,
) -> AppResult<Json<PaginatedResponse<Purchase>>> {
    let service = PurchaseService::new(state.db);
    let purchases = service.list(&filter).await?;
    Ok(Json(purchases))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseWithLines>> {
    let service = PurchaseService::new(state.db);
    let purchase = service.get(purchase_id).await?;
    Ok(Json(purchase))
}

/// Cancel a purchase and undo its stock and cost effects
pub async fn cancel_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
    input: Option<Json<CancelPurchaseInput>>,
) -> AppResult<Json<PurchaseWithLines>> {
    check_permission(&current_user.0, Resource::Purchase, Action::Delete)?;
    let reason = input.and_then(|Json(input)| input.reason);
    let service = PurchaseService::new(state.db);
    let purchase = service
        .cancel(current_user.0.user_id, purchase_id, reason)
        .await?;
    Ok(Json(purchase))
}
