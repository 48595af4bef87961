//! HTTP handlers for the home dashboard

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dashboard::{
    ActivityItem, DashboardOverview, DashboardService, MonthKpis, SalesByPeriod, TodaySummary,
    TopProduct, TopProductsChart,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesPeriodQuery {
    pub days: Option<u32>,
    #[serde(default)]
    pub compare: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

/// Everything the dashboard shows on first load
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardOverview>> {
    let service = DashboardService::new(state.db);
    let overview = service
        .overview(current_user.0.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(overview))
}

pub async fn get_dashboard_kpis(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MonthKpis>> {
    let service = DashboardService::new(state.db);
    let kpis = service
        .kpis(current_user.0.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(kpis))
}

pub async fn get_today_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<TodaySummary>> {
    let service = DashboardService::new(state.db);
    let summary = service.today(Utc::now().date_naive()).await?;
    Ok(Json(summary))
}

pub async fn list_recent_activity(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<ActivityItem>>> {
    let limit = query.limit.unwrap_or(10) as i64;
    let service = DashboardService::new(state.db);
    let activity = service.activity(limit).await?;
    Ok(Json(activity))
}

pub async fn list_top_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<TopProduct>>> {
    let service = DashboardService::new(state.db);
    let products = service
        .top_products(Utc::now().date_naive(), query.limit.unwrap_or(5))
        .await?;
    Ok(Json(products))
}

/// Daily sales series, optionally compared with the previous period
pub async fn get_sales_by_period(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SalesPeriodQuery>,
) -> AppResult<Json<SalesByPeriod>> {
    let service = DashboardService::new(state.db);
    let sales = service
        .sales_by_period(
            Utc::now().date_naive(),
            query.days.unwrap_or(30),
            query.compare,
        )
        .await?;
    Ok(Json(sales))
}

pub async fn get_top_products_chart(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ChartQuery>,
) -> AppResult<Json<TopProductsChart>> {
    let service = DashboardService::new(state.db);
    let chart = service
        .top_products_chart(
            Utc::now().date_naive(),
            query.days.unwrap_or(30).clamp(1, 366),
            query.limit.unwrap_or(10),
        )
        .await?;
    Ok(Json(chart))
}
