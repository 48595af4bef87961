//! HTTP handlers for financial analytics

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::analytics::{
    AnalyticsService, BreakEvenReport, CashFlowReport, HealthReport, PriceEvolution,
    PriceRecommendation, ProfitabilityAlerts, RoiReport,
};
use crate::services::inventory::RotationReport;
use crate::AppState;

/// Length of the analysed or projected period, in days
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub days: Option<u32>,
}

impl PeriodQuery {
    fn days_or(&self, default: u32) -> u32 {
        self.days.unwrap_or(default).clamp(1, 366)
    }
}

pub async fn get_roi(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<RoiReport>> {
    let service = AnalyticsService::new(state.db);
    let report = service
        .roi(Utc::now().date_naive(), query.days_or(30))
        .await?;
    Ok(Json(report))
}

pub async fn get_break_even(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<BreakEvenReport>> {
    let service = AnalyticsService::new(state.db);
    let report = service.break_even(Utc::now().date_naive()).await?;
    Ok(Json(report))
}

pub async fn get_cash_flow(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<CashFlowReport>> {
    let service = AnalyticsService::new(state.db);
    let report = service
        .cash_flow(Utc::now().date_naive(), i64::from(query.days_or(30)))
        .await?;
    Ok(Json(report))
}

pub async fn get_rotation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<RotationReport>> {
    let service = AnalyticsService::new(state.db);
    let report = service.rotation(Utc::now().date_naive()).await?;
    Ok(Json(report))
}

/// Overall business health score
pub async fn get_health(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<HealthReport>> {
    let service = AnalyticsService::new(state.db);
    let report = service.health(Utc::now().date_naive()).await?;
    Ok(Json(report))
}

pub async fn get_profitability_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ProfitabilityAlerts>> {
    let service = AnalyticsService::new(state.db);
    let alerts = service.profitability_alerts(Utc::now().date_naive()).await?;
    Ok(Json(alerts))
}

/// Average sale price this month against last month, per product
pub async fn get_cost_evolution(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<PriceEvolution>>> {
    let service = AnalyticsService::new(state.db);
    let evolution = service.cost_evolution(Utc::now().date_naive()).await?;
    Ok(Json(evolution))
}

pub async fn get_price_recommendations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<PriceRecommendation>>> {
    let service = AnalyticsService::new(state.db);
    let recommendations = service
        .price_recommendations(Utc::now().date_naive())
        .await?;
    Ok(Json(recommendations))
}
