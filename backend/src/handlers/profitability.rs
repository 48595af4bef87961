//! HTTP handlers for profitability reports and cost settings

use axum::{extract::State, Json};
use chrono::Utc;
use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::CostSettings;
use crate::services::profitability::{
    CriticalProducts, LowMarginProduct, ProductProfitability, ProfitabilityService,
    ProfitabilitySummary, Recommendation, UpdateSettingsInput,
};
use crate::AppState;

pub async fn get_profitability_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ProfitabilitySummary>> {
    let service = ProfitabilityService::new(state.db);
    let summary = service.summary(Utc::now().date_naive()).await?;
    Ok(Json(summary))
}

pub async fn list_low_margin_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowMarginProduct>>> {
    let service = ProfitabilityService::new(state.db);
    let products = service.low_margin(Utc::now().date_naive()).await?;
    Ok(Json(products))
}

pub async fn get_critical_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<CriticalProducts>> {
    let service = ProfitabilityService::new(state.db);
    let critical = service.critical(Utc::now().date_naive()).await?;
    Ok(Json(critical))
}

pub async fn list_profitability_recommendations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Recommendation>>> {
    let service = ProfitabilityService::new(state.db);
    let recommendations = service.recommendations(Utc::now().date_naive()).await?;
    Ok(Json(recommendations))
}

/// Margin of every active product against the target, lowest first
pub async fn list_product_profitability(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductProfitability>>> {
    let service = ProfitabilityService::new(state.db);
    let products = service.products(Utc::now().date_naive()).await?;
    Ok(Json(products))
}

pub async fn get_cost_settings(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<CostSettings>> {
    let service = ProfitabilityService::new(state.db);
    let settings = service.settings().await?;
    Ok(Json(settings))
}

pub async fn update_cost_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateSettingsInput>,
) -> AppResult<Json<CostSettings>> {
    check_permission(&current_user.0, Resource::Settings, Action::Edit)?;
    let service = ProfitabilityService::new(state.db);
    let settings = service.update_settings(input).await?;
    Ok(Json(settings))
}
