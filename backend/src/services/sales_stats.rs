//! Aggregate queries shared by the analytics services

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ProductActivity;
use crate::services::products::UNIT_COST_SQL;
use shared::{
    margin_percent, month_start, previous_month_start, DateRange, StockStatus,
    PURCHASE_WINDOW_DAYS, SALES_WINDOW_DAYS,
};

/// From the first of the month up to `today`
pub(crate) fn month_to_date(today: NaiveDate) -> DateRange {
    DateRange::new(month_start(today), today)
}

/// The whole calendar month before the one containing `today`
pub(crate) fn previous_month(today: NaiveDate) -> DateRange {
    let start = month_start(today);
    DateRange::new(previous_month_start(today), start.pred_opt().unwrap_or(start))
}

/// An active product with its sales over a date range
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSales {
    pub product_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub stock: i32,
    pub minimum_stock: i32,
    pub units_sold: i64,
    pub revenue: Decimal,
    /// Σ quantity × cost snapshot of the lines sold
    pub cogs: Decimal,
}

impl ProductSales {
    pub fn margin(&self) -> Decimal {
        margin_percent(self.price, self.unit_cost)
    }

    pub fn stock_value(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.stock)
    }

    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.stock, self.minimum_stock)
    }
}

/// Every active product with units, revenue and COGS in `range`
pub(crate) async fn product_sales(db: &PgPool, range: &DateRange) -> AppResult<Vec<ProductSales>> {
    let rows = sqlx::query_as::<_, ProductSales>(&format!(
        r#"
        SELECT p.id AS product_id, p.name, p.category, p.price, {} AS unit_cost,
               p.stock, p.minimum_stock,
               COALESCE(w.units, 0)::BIGINT AS units_sold,
               COALESCE(w.revenue, 0) AS revenue,
               COALESCE(w.cogs, 0) AS cogs
        FROM products p
        LEFT JOIN (
            SELECT sl.product_id,
                   SUM(sl.quantity) AS units,
                   SUM(sl.subtotal) AS revenue,
                   SUM(sl.quantity * sl.unit_cost) AS cogs
            FROM sale_lines sl
            JOIN sales s ON s.id = sl.sale_id
            WHERE NOT s.is_deleted AND s.sold_at::date BETWEEN $1 AND $2
            GROUP BY sl.product_id
        ) w ON w.product_id = p.id
        WHERE p.is_active
        ORDER BY p.name
        "#,
        UNIT_COST_SQL
    ))
    .bind(range.start)
    .bind(range.end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Totals of active sales in a range
#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct SalesTotals {
    pub count: i64,
    pub amount: Decimal,
    pub units: i64,
    pub cogs: Decimal,
}

pub(crate) async fn sales_totals(db: &PgPool, range: &DateRange) -> AppResult<SalesTotals> {
    let totals = sqlx::query_as::<_, SalesTotals>(
        r#"
        SELECT COUNT(DISTINCT s.id) AS count,
               COALESCE(SUM(sl.subtotal), 0) AS amount,
               COALESCE(SUM(sl.quantity), 0)::BIGINT AS units,
               COALESCE(SUM(sl.quantity * sl.unit_cost), 0) AS cogs
        FROM sales s
        LEFT JOIN sale_lines sl ON sl.sale_id = s.id
        WHERE NOT s.is_deleted AND s.sold_at::date BETWEEN $1 AND $2
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_one(db)
    .await?;
    Ok(totals)
}

/// Total of active purchases in a range
pub(crate) async fn purchases_total(db: &PgPool, range: &DateRange) -> AppResult<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(total), 0)
        FROM purchases
        WHERE is_active AND purchased_on BETWEEN $1 AND $2
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_one(db)
    .await?;
    Ok(total)
}

/// Value of product stock at current unit costs
pub(crate) async fn inventory_value(db: &PgPool) -> AppResult<Decimal> {
    let value: Decimal = sqlx::query_scalar(&format!(
        r#"
        SELECT COALESCE(SUM(({}) * p.stock), 0)
        FROM products p
        WHERE p.is_active AND p.stock > 0
        "#,
        UNIT_COST_SQL
    ))
    .fetch_one(db)
    .await?;
    Ok(shared::round_money(value))
}

/// Daily sales totals in a range; days without sales are absent
#[derive(Debug, Clone, FromRow)]
pub(crate) struct DailyTotal {
    pub day: NaiveDate,
    pub amount: Decimal,
    pub count: i64,
}

pub(crate) async fn daily_sales(db: &PgPool, range: &DateRange) -> AppResult<Vec<DailyTotal>> {
    let rows = sqlx::query_as::<_, DailyTotal>(
        r#"
        SELECT s.sold_at::date AS day, SUM(s.total) AS amount, COUNT(*) AS count
        FROM sales s
        WHERE NOT s.is_deleted AND s.sold_at::date BETWEEN $1 AND $2
        GROUP BY s.sold_at::date
        ORDER BY day
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub(crate) async fn daily_purchases(db: &PgPool, range: &DateRange) -> AppResult<Vec<DailyTotal>> {
    let rows = sqlx::query_as::<_, DailyTotal>(
        r#"
        SELECT purchased_on AS day, SUM(total) AS amount, COUNT(*) AS count
        FROM purchases
        WHERE is_active AND purchased_on BETWEEN $1 AND $2
        GROUP BY purchased_on
        ORDER BY day
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Spread daily totals over every day of `range`, filling gaps with zero
pub(crate) fn fill_days(range: &DateRange, totals: &[DailyTotal]) -> Vec<(NaiveDate, Decimal, i64)> {
    range
        .iter_days()
        .map(|day| {
            totals
                .iter()
                .find(|t| t.day == day)
                .map(|t| (day, t.amount, t.count))
                .unwrap_or((day, Decimal::ZERO, 0))
        })
        .collect()
}

/// Stock, margin and recent sales of every active product, as of `today`
pub(crate) async fn product_activity(db: &PgPool, today: NaiveDate) -> AppResult<Vec<ProductActivity>> {
    let rows = sqlx::query_as::<_, ProductActivity>(&format!(
        r#"
        SELECT p.id AS product_id, p.name, p.price, {} AS unit_cost,
               p.stock, p.minimum_stock,
               COALESCE((
                   SELECT SUM(sl.quantity)
                   FROM sale_lines sl
                   JOIN sales s ON s.id = sl.sale_id
                   WHERE sl.product_id = p.id AND NOT s.is_deleted
                     AND s.sold_at::date > $1::date - $2::int
               ), 0)::BIGINT AS units_sold_30d,
               (
                   SELECT ($1::date - MAX(s.sold_at)::date)::BIGINT
                   FROM sale_lines sl
                   JOIN sales s ON s.id = sl.sale_id
                   WHERE sl.product_id = p.id AND NOT s.is_deleted
               ) AS days_since_last_sale
        FROM products p
        WHERE p.is_active
        ORDER BY p.name
        "#,
        UNIT_COST_SQL
    ))
    .bind(today)
    .bind(SALES_WINDOW_DAYS as i32)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Average unit sale price of each product sold in a range
#[derive(Debug, Clone, FromRow)]
pub struct AveragePrice {
    pub product_id: Uuid,
    pub name: String,
    pub average_price: Decimal,
    pub units: i64,
}

pub(crate) async fn average_sale_prices(
    db: &PgPool,
    range: &DateRange,
) -> AppResult<Vec<AveragePrice>> {
    let rows = sqlx::query_as::<_, AveragePrice>(
        r#"
        SELECT p.id AS product_id, p.name,
               ROUND(SUM(sl.subtotal) / SUM(sl.quantity), 2) AS average_price,
               SUM(sl.quantity)::BIGINT AS units
        FROM sale_lines sl
        JOIN sales s ON s.id = sl.sale_id
        JOIN products p ON p.id = sl.product_id
        WHERE NOT s.is_deleted AND s.sold_at::date BETWEEN $1 AND $2
        GROUP BY p.id, p.name
        HAVING SUM(sl.quantity) > 0
        ORDER BY p.name
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Days since the last active purchase and the number of purchases in the
/// ninety days up to `today`
pub(crate) async fn purchase_activity(
    db: &PgPool,
    today: NaiveDate,
) -> AppResult<(Option<i64>, i64)> {
    let row: (Option<i64>, i64) = sqlx::query_as(
        r#"
        SELECT ($1::date - MAX(purchased_on))::BIGINT,
               COUNT(*) FILTER (WHERE purchased_on > $1::date - $2::int)
        FROM purchases
        WHERE is_active AND purchased_on <= $1
        "#,
    )
    .bind(today)
    .bind(PURCHASE_WINDOW_DAYS as i32)
    .fetch_one(db)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fill_days_pads_missing_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let range = DateRange::last_days(start + chrono::Duration::days(2), 3);
        let totals = vec![DailyTotal {
            day: start + chrono::Duration::days(1),
            amount: dec!(1500),
            count: 2,
        }];

        let filled = fill_days(&range, &totals);
        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0], (start, Decimal::ZERO, 0));
        assert_eq!(filled[1].1, dec!(1500));
        assert_eq!(filled[2].2, 0);
    }

    #[test]
    fn test_previous_month_covers_whole_month() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let range = previous_month(today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(month_to_date(today).days(), 15);
    }
}
