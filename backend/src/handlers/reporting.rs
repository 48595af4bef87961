//! Export handlers: JSON by default, CSV with `format=csv`

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::auth::{check_permission, AuthUser};
use crate::services::reporting::{ExportFilter, ReportingService};
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub include_inactive: bool,
    pub format: Option<String>, // "json" or "csv"
}

impl ExportQuery {
    fn filter(&self) -> ExportFilter {
        ExportFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            include_inactive: self.include_inactive,
        }
    }
}

fn export_response<T: Serialize>(
    data: Vec<T>,
    format: Option<&str>,
    filename: &'static str,
) -> AppResult<Response> {
    if format == Some("csv") {
        let csv = ReportingService::export_to_csv(&data)?;
        let disposition = format!("attachment; filename=\"{}\"", filename);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(data).into_response())
    }
}

/// Export the product catalog with unit costs
pub async fn export_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::Export)?;
    let service = ReportingService::new(state.db.clone());
    let data = service.products(&query.filter()).await?;
    export_response(data, query.format.as_deref(), "productos.csv")
}

/// Export sale lines in a date range
pub async fn export_sales(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::Export)?;
    let service = ReportingService::new(state.db.clone());
    let data = service.sales(&query.filter()).await?;
    export_response(data, query.format.as_deref(), "ventas.csv")
}

/// Export raw materials with stock value
pub async fn export_raw_materials(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::Export)?;
    let service = ReportingService::new(state.db.clone());
    let data = service.raw_materials(&query.filter()).await?;
    export_response(data, query.format.as_deref(), "materias_primas.csv")
}
