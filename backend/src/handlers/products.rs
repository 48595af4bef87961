//! HTTP handlers for the product catalog

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{PricedProduct, Product};
use crate::services::products::{
    ApplyPriceInput, CreateProductInput, ProductCost, ProductFilter, ProductService,
    ProductionInput, ProductionResult, UpdateProductInput,
};
use crate::AppState;

/// List products with their current unit cost
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<PricedProduct>>> {
    let service = ProductService::new(state.db);
    let products = service.list(&filter).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<PricedProduct>> {
    let service = ProductService::new(state.db);
    let product = service.get(product_id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    check_permission(&current_user.0, Resource::Product, Action::Create)?;
    let service = ProductService::new(state.db);
    let product = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, Resource::Product, Action::Edit)?;
    let service = ProductService::new(state.db);
    let product = service.update(product_id, input).await?;
    Ok(Json(product))
}

/// Deactivate a product
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, Resource::Product, Action::Delete)?;
    let service = ProductService::new(state.db);
    service.delete(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cost breakdown, margin and suggested price
pub async fn get_product_cost(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductCost>> {
    let service = ProductService::new(state.db);
    let cost = service.cost(product_id).await?;
    Ok(Json(cost))
}

/// Produce units from the product's recipe or bulk raw material
pub async fn produce_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ProductionInput>,
) -> AppResult<Json<ProductionResult>> {
    check_permission(&current_user.0, Resource::Product, Action::Edit)?;
    let service = ProductService::new(state.db);
    let result = service
        .produce(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(result))
}

/// Apply a new sale price, usually a suggested one
pub async fn apply_product_price(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ApplyPriceInput>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, Resource::Product, Action::Edit)?;
    let service = ProductService::new(state.db);
    let product = service.apply_price(product_id, input.price).await?;
    Ok(Json(product))
}
