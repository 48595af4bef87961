//! Read-only JSON feeds for external sales channels

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sync::{
    ProductPrice, StockCheck, SyncProduct, SyncRawMaterial, SyncSale, SyncService,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SyncSalesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyStockQuery {
    pub quantity: i32,
}

pub async fn sync_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<SyncProduct>>> {
    let service = SyncService::new(state.db);
    let products = service.products().await?;
    Ok(Json(products))
}

pub async fn sync_inventory(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<SyncRawMaterial>>> {
    let service = SyncService::new(state.db);
    let materials = service.inventory().await?;
    Ok(Json(materials))
}

pub async fn sync_sales(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SyncSalesQuery>,
) -> AppResult<Json<Vec<SyncSale>>> {
    let service = SyncService::new(state.db);
    let sales = service.sales(query.limit.unwrap_or(50)).await?;
    Ok(Json(sales))
}

pub async fn sync_product_price(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductPrice>> {
    let service = SyncService::new(state.db);
    let price = service.price(product_id).await?;
    Ok(Json(price))
}

/// Whether a quantity can be sold, and made, from current stock
pub async fn verify_product_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<VerifyStockQuery>,
) -> AppResult<Json<StockCheck>> {
    let service = SyncService::new(state.db);
    let check = service.verify_stock(product_id, query.quantity).await?;
    Ok(Json(check))
}
