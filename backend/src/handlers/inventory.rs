//! HTTP handlers for inventory KPIs

use axum::{extract::State, Json};
use chrono::Utc;
use shared::PurchaseCadence;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    CoverageKpi, CriticalStock, InventoryService, InventoryValue, RotationReport, SlowMover,
    StockStatusItem,
};
use crate::AppState;

/// Days of stock coverage across active products
pub async fn get_inventory_coverage(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<CoverageKpi>> {
    let service = InventoryService::new(state.db);
    let coverage = service.coverage(Utc::now().date_naive()).await?;
    Ok(Json(coverage))
}

pub async fn get_critical_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<CriticalStock>> {
    let service = InventoryService::new(state.db);
    let critical = service.critical(Utc::now().date_naive()).await?;
    Ok(Json(critical))
}

pub async fn get_purchase_cadence(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<PurchaseCadence>> {
    let service = InventoryService::new(state.db);
    let cadence = service.purchase_cadence(Utc::now().date_naive()).await?;
    Ok(Json(cadence))
}

pub async fn get_inventory_value(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<InventoryValue>> {
    let service = InventoryService::new(state.db);
    let value = service.value().await?;
    Ok(Json(value))
}

pub async fn get_inventory_rotation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<RotationReport>> {
    let service = InventoryService::new(state.db);
    let rotation = service.rotation(Utc::now().date_naive()).await?;
    Ok(Json(rotation))
}

pub async fn list_slow_movers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<SlowMover>>> {
    let service = InventoryService::new(state.db);
    let products = service.slow_movers(Utc::now().date_naive()).await?;
    Ok(Json(products))
}

/// Stock status of every active product
pub async fn list_stock_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockStatusItem>>> {
    let service = InventoryService::new(state.db);
    let items = service.status(Utc::now().date_naive()).await?;
    Ok(Json(items))
}
