//! HTTP handlers for inventory adjustments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::InventoryAdjustment;
use crate::services::adjustments::{AdjustmentFilter, AdjustmentService, CreateAdjustmentInput};
use crate::AppState;

/// Set an item's stock to a counted value
pub async fn create_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAdjustmentInput>,
) -> AppResult<(StatusCode, Json<InventoryAdjustment>)> {
    check_permission(&current_user.0, Resource::Adjustment, Action::Create)?;
    let service = AdjustmentService::new(state.db);
    let adjustment = service.create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(adjustment)))
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<AdjustmentFilter>,
) -> AppResult<Json<PaginatedResponse<InventoryAdjustment>>> {
    let service = AdjustmentService::new(state.db);
    let adjustments = service.list(&filter).await?;
    Ok(Json(adjustments))
}

pub async fn get_adjustment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<InventoryAdjustment>> {
    let service = AdjustmentService::new(state.db);
    let adjustment = service.get(adjustment_id).await?;
    Ok(Json(adjustment))
}
