//! HTTP handlers for marketing suggestions

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::marketing::{
    CrossSelling, HeroProduct, MarketingService, PromotionCandidate, TrendingProduct,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrossSellingQuery {
    pub product_id: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowRotationQuery {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

/// Products selling faster this week than last
pub async fn list_trending_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<TrendingProduct>>> {
    let service = MarketingService::new(state.db);
    let products = service
        .trending(Utc::now().date_naive(), query.limit.unwrap_or(5))
        .await?;
    Ok(Json(products))
}

/// Most profitable products of the month
pub async fn list_hero_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<HeroProduct>>> {
    let service = MarketingService::new(state.db);
    let products = service
        .heroes(Utc::now().date_naive(), query.limit.unwrap_or(3))
        .await?;
    Ok(Json(products))
}

pub async fn get_cross_selling(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<CrossSellingQuery>,
) -> AppResult<Json<CrossSelling>> {
    let service = MarketingService::new(state.db);
    let suggestions = service
        .cross_selling(query.product_id, query.limit.unwrap_or(5))
        .await?;
    Ok(Json(suggestions))
}

/// Stocked products without recent sales, with a suggested discount
pub async fn list_low_rotation_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LowRotationQuery>,
) -> AppResult<Json<Vec<PromotionCandidate>>> {
    let service = MarketingService::new(state.db);
    let products = service
        .low_rotation(
            Utc::now().date_naive(),
            query.days.unwrap_or(60),
            query.limit.unwrap_or(10),
        )
        .await?;
    Ok(Json(products))
}
