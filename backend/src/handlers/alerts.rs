//! HTTP handlers for user alerts

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Alert, AlertRule};
use crate::services::alerts::{AlertFilter, AlertService, GenerationReport, UnreadCount};
use crate::AppState;

/// Rules to run; all of them when absent or empty
#[derive(Debug, Default, Deserialize)]
pub struct GenerateAlertsInput {
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<AlertFilter>,
) -> AppResult<Json<Vec<Alert>>> {
    let service = AlertService::new(state.db);
    let alerts = service.list(current_user.0.user_id, &filter).await?;
    Ok(Json(alerts))
}

pub async fn get_unread_alert_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UnreadCount>> {
    let service = AlertService::new(state.db);
    let count = service.unread_count(current_user.0.user_id).await?;
    Ok(Json(count))
}

/// Evaluate alert rules against current stock, margins and sales
pub async fn generate_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    input: Option<Json<GenerateAlertsInput>>,
) -> AppResult<Json<GenerationReport>> {
    check_permission(&current_user.0, Resource::Alert, Action::Create)?;
    let requested = input.map(|Json(input)| input.rules).unwrap_or_default();
    let rules: &[AlertRule] = if requested.is_empty() {
        &AlertRule::ALL
    } else {
        &requested
    };

    let service = AlertService::new(state.db);
    let report = service
        .generate(current_user.0.user_id, rules, Utc::now().date_naive())
        .await?;
    Ok(Json(report))
}

pub async fn mark_alert_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<Alert>> {
    let service = AlertService::new(state.db);
    let alert = service.mark_read(current_user.0.user_id, alert_id).await?;
    Ok(Json(alert))
}

pub async fn mark_all_alerts_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let service = AlertService::new(state.db);
    let updated = service.mark_all_read(current_user.0.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn archive_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<Alert>> {
    let service = AlertService::new(state.db);
    let alert = service.archive(current_user.0.user_id, alert_id).await?;
    Ok(Json(alert))
}
