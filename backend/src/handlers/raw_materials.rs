//! HTTP handlers for raw materials

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{RawMaterial, RawMaterialMovement};
use crate::services::raw_materials::{
    CreateRawMaterialInput, LowStockRawMaterial, RawMaterialService, UpdateRawMaterialInput,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RawMaterialListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<i64>,
}

pub async fn list_raw_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<RawMaterialListQuery>,
) -> AppResult<Json<Vec<RawMaterial>>> {
    let service = RawMaterialService::new(state.db);
    let materials = service.list(query.include_inactive).await?;
    Ok(Json(materials))
}

pub async fn get_raw_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(raw_material_id): Path<Uuid>,
) -> AppResult<Json<RawMaterial>> {
    let service = RawMaterialService::new(state.db);
    let material = service.get(raw_material_id).await?;
    Ok(Json(material))
}

pub async fn create_raw_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRawMaterialInput>,
) -> AppResult<(StatusCode, Json<RawMaterial>)> {
    check_permission(&current_user.0, Resource::RawMaterial, Action::Create)?;
    let service = RawMaterialService::new(state.db);
    let material = service.create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn update_raw_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(raw_material_id): Path<Uuid>,
    Json(input): Json<UpdateRawMaterialInput>,
) -> AppResult<Json<RawMaterial>> {
    check_permission(&current_user.0, Resource::RawMaterial, Action::Edit)?;
    let service = RawMaterialService::new(state.db);
    let material = service.update(raw_material_id, input).await?;
    Ok(Json(material))
}

/// Stock movements of a raw material, newest first
pub async fn list_raw_material_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(raw_material_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> AppResult<Json<Vec<RawMaterialMovement>>> {
    let service = RawMaterialService::new(state.db);
    let movements = service
        .movements(raw_material_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(movements))
}

/// Raw materials at or below their minimum stock
pub async fn list_low_stock_raw_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockRawMaterial>>> {
    let service = RawMaterialService::new(state.db);
    let materials = service.low_stock().await?;
    Ok(Json(materials))
}
