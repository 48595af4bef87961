//! Flat exports of the catalog, sales and raw materials

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::products::UNIT_COST_SQL;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Product export row
#[derive(Debug, Serialize, FromRow)]
pub struct ProductExportRow {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub stock: i32,
    pub minimum_stock: i32,
    pub is_active: bool,
}

/// One sale line per row, with its sale header repeated
#[derive(Debug, Serialize, FromRow)]
pub struct SaleExportRow {
    pub sale_id: Uuid,
    pub sold_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub product: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
}

/// Raw material export row
#[derive(Debug, Serialize, FromRow)]
pub struct RawMaterialExportRow {
    pub id: Uuid,
    pub name: String,
    pub supplier: Option<String>,
    pub unit: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub unit_cost: Decimal,
    pub stock_value: Decimal,
}

/// Export filter parameters
#[derive(Debug, Default, Deserialize)]
pub struct ExportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn products(&self, filter: &ExportFilter) -> AppResult<Vec<ProductExportRow>> {
        let rows = sqlx::query_as::<_, ProductExportRow>(&format!(
            r#"
            SELECT p.id, p.name, p.category, p.price, {} AS unit_cost,
                   p.stock, p.minimum_stock, p.is_active
            FROM products p
            WHERE p.is_active OR $1
            ORDER BY p.name
            "#,
            UNIT_COST_SQL
        ))
        .bind(filter.include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn sales(&self, filter: &ExportFilter) -> AppResult<Vec<SaleExportRow>> {
        let rows = sqlx::query_as::<_, SaleExportRow>(
            r#"
            SELECT s.id AS sale_id, s.sold_at, s.customer_name, p.name AS product,
                   sl.quantity, sl.unit_price, sl.unit_cost, sl.subtotal
            FROM sales s
            JOIN sale_lines sl ON sl.sale_id = s.id
            JOIN products p ON p.id = sl.product_id
            WHERE NOT s.is_deleted
              AND ($1::date IS NULL OR s.sold_at::date >= $1)
              AND ($2::date IS NULL OR s.sold_at::date <= $2)
            ORDER BY s.sold_at DESC, p.name
            "#,
        )
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn raw_materials(&self, filter: &ExportFilter) -> AppResult<Vec<RawMaterialExportRow>> {
        let rows = sqlx::query_as::<_, RawMaterialExportRow>(
            r#"
            SELECT id, name, supplier, unit, current_stock, minimum_stock, unit_cost,
                   ROUND(current_stock * unit_cost, 2) AS stock_value
            FROM raw_materials
            WHERE is_active OR $1
            ORDER BY name
            "#,
        )
        .bind(filter.include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_export_to_csv_writes_header_and_rows() {
        let rows = vec![RawMaterialExportRow {
            id: Uuid::nil(),
            name: "Harina de almendras".to_string(),
            supplier: None,
            unit: "kg".to_string(),
            current_stock: dec!(12.5),
            minimum_stock: dec!(5),
            unit_cost: dec!(8000),
            stock_value: dec!(100000),
        }];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,supplier,unit,current_stock,minimum_stock,unit_cost,stock_value")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("00000000-0000-0000-0000-000000000000,Harina de almendras,,kg,"));
        assert!(row.contains("12.5"));
        assert_eq!(lines.next(), None);
    }
}
