//! Sales: creation with stock decrement, listing and reversible deletion

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{line_subtotal, sale_total, Product, Sale, SaleLine, SaleLineInput, SaleWithLines};
use crate::services::products::{cost_basis, PRODUCT_COLUMNS};
use shared::{validate_sale_lines, PaginatedResponse, Pagination, PaginationMeta, ProductStockView};

const SALE_COLUMNS: &str = "id, sold_at, customer_name, notes, total, is_deleted, deleted_at, \
     deleted_by, deletion_reason, created_by, created_at";

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    /// Defaults to now
    pub sold_at: Option<DateTime<Utc>>,
    pub lines: Vec<SaleLineInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SaleFilter {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteSaleInput {
    pub reason: Option<String>,
}

/// Add up requested units per product, keyed in lock order
pub fn units_per_product(lines: impl IntoIterator<Item = (Uuid, i32)>) -> BTreeMap<Uuid, i32> {
    let mut totals = BTreeMap::new();
    for (product_id, quantity) in lines {
        let total = totals.entry(product_id).or_insert(0i32);
        *total = total.saturating_add(quantity);
    }
    totals
}

/// Which way a sale moves product stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    /// Units leave stock when the sale is recorded
    Sale,
    /// Units come back when the sale is deleted
    Reversal,
}

/// Stock each product ends with once `lines` move in the given direction.
///
/// Lines of the same product are added up first. Products missing from
/// `current` are left out.
pub fn stock_after(
    current: &HashMap<Uuid, i32>,
    lines: impl IntoIterator<Item = (Uuid, i32)>,
    movement: StockMovement,
) -> BTreeMap<Uuid, i32> {
    units_per_product(lines)
        .into_iter()
        .filter_map(|(product_id, units)| {
            let stock = *current.get(&product_id)?;
            let level = match movement {
                StockMovement::Sale => stock.saturating_sub(units),
                StockMovement::Reversal => stock.saturating_add(units),
            };
            Some((product_id, level))
        })
        .collect()
}

async fn load_lines(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<Vec<SaleLine>> {
    let lines = sqlx::query_as::<_, SaleLine>(
        r#"
        SELECT sl.id, sl.sale_id, sl.product_id, p.name AS product_name, sl.quantity,
               sl.unit_price, sl.unit_cost, sl.subtotal
        FROM sale_lines sl
        JOIN products p ON p.id = sl.product_id
        WHERE sl.sale_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

impl SalesService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a sale and take its units out of stock.
    ///
    /// Every product row is locked before validation so the stock check and
    /// the decrement see the same numbers. All line errors are reported at once.
    pub async fn create(&self, user_id: Uuid, input: CreateSaleInput) -> AppResult<SaleWithLines> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let requested = units_per_product(input.lines.iter().map(|l| (l.product_id, l.quantity)));
        let mut products: HashMap<Uuid, Product> = HashMap::with_capacity(requested.len());
        for product_id in requested.keys() {
            let product = sqlx::query_as::<_, Product>(&format!(
                "SELECT {} FROM products p WHERE p.id = $1 FOR UPDATE",
                PRODUCT_COLUMNS
            ))
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(product) = product {
                products.insert(*product_id, product);
            }
        }

        validate_sale_lines(&input.lines, |id| {
            products.get(&id).map(|p| ProductStockView {
                name: p.name.clone(),
                stock: p.stock,
                is_active: p.is_active,
            })
        })?;

        let mut unit_costs: HashMap<Uuid, Decimal> = HashMap::with_capacity(products.len());
        for (product_id, product) in &products {
            let basis = cost_basis(&mut tx, product).await?;
            unit_costs.insert(*product_id, basis.unit_cost());
        }

        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            INSERT INTO sales (sold_at, customer_name, notes, created_by)
            VALUES (COALESCE($1, NOW()), $2, $3, $4)
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(input.sold_at)
        .bind(&input.customer_name)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            let unit_price = line.unit_price.unwrap_or(product.price);
            let unit_cost = unit_costs
                .get(&line.product_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let subtotal = line_subtotal(line.quantity, unit_price);

            let id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO sale_lines (sale_id, product_id, quantity, unit_price, unit_cost, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(sale.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(unit_price)
            .bind(unit_cost)
            .bind(subtotal)
            .fetch_one(&mut *tx)
            .await?;

            lines.push(SaleLine {
                id,
                sale_id: sale.id,
                product_id: line.product_id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price,
                unit_cost,
                subtotal,
            });
        }

        let current: HashMap<Uuid, i32> = products.iter().map(|(id, p)| (*id, p.stock)).collect();
        let levels = stock_after(
            &current,
            input.lines.iter().map(|l| (l.product_id, l.quantity)),
            StockMovement::Sale,
        );
        for (product_id, new_stock) in levels {
            let Some(product) = products.get(&product_id) else {
                continue;
            };
            sqlx::query("UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2")
                .bind(new_stock)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;

            if new_stock == 0 {
                tracing::warn!(product_id = %product_id, name = %product.name, "Product out of stock");
            } else if product.stock > product.minimum_stock && new_stock <= product.minimum_stock {
                tracing::info!(
                    product_id = %product_id,
                    name = %product.name,
                    stock = new_stock,
                    minimum = product.minimum_stock,
                    "Product reached minimum stock"
                );
            }
        }

        let total = sale_total(lines.iter().map(|l| l.subtotal));
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "UPDATE sales SET total = $1 WHERE id = $2 RETURNING {}",
            SALE_COLUMNS
        ))
        .bind(total)
        .bind(sale.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            sale_id = %sale.id,
            user_id = %user_id,
            total = %sale.total,
            lines = lines.len(),
            "Sale created"
        );

        Ok(SaleWithLines { sale, lines })
    }

    /// Sales in a date range, newest first
    pub async fn list(&self, filter: &SaleFilter) -> AppResult<PaginatedResponse<Sale>> {
        let pagination = filter.pagination();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM sales
            WHERE (NOT is_deleted OR $1)
              AND ($2::date IS NULL OR sold_at::date >= $2)
              AND ($3::date IS NULL OR sold_at::date <= $3)
            "#,
        )
        .bind(filter.include_deleted)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(&self.db)
        .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {}
            FROM sales
            WHERE (NOT is_deleted OR $1)
              AND ($2::date IS NULL OR sold_at::date >= $2)
              AND ($3::date IS NULL OR sold_at::date <= $3)
            ORDER BY sold_at DESC
            LIMIT $4 OFFSET $5
            "#,
            SALE_COLUMNS
        ))
        .bind(filter.include_deleted)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: sales,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    pub async fn get(&self, sale_id: Uuid) -> AppResult<SaleWithLines> {
        let mut conn = self.db.acquire().await?;

        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = $1",
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sale {}", sale_id)))?;

        let lines = load_lines(&mut conn, sale_id).await?;
        Ok(SaleWithLines { sale, lines })
    }

    /// Soft-delete a sale and put its units back in stock
    pub async fn delete(
        &self,
        user_id: Uuid,
        sale_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<SaleWithLines> {
        let mut tx = self.db.begin().await?;

        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = $1 FOR UPDATE",
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sale {}", sale_id)))?;

        if sale.is_deleted {
            return Err(AppError::InvalidStateTransition(format!(
                "Sale {} is already deleted",
                sale_id
            )));
        }

        let lines = load_lines(&mut tx, sale_id).await?;
        let sold: Vec<(Uuid, i32)> = lines.iter().map(|l| (l.product_id, l.quantity)).collect();

        let mut current = HashMap::new();
        for product_id in units_per_product(sold.iter().copied()).keys() {
            let stock: Option<i32> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(stock) = stock {
                current.insert(*product_id, stock);
            }
        }

        let restored = stock_after(&current, sold, StockMovement::Reversal);
        for (product_id, stock) in &restored {
            sqlx::query("UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2")
                .bind(stock)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales
            SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $1, deletion_reason = $2
            WHERE id = $3
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(user_id)
        .bind(&reason)
        .bind(sale_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            sale_id = %sale_id,
            user_id = %user_id,
            products_restored = restored.len(),
            "Sale deleted"
        );

        Ok(SaleWithLines { sale, lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_per_product_merges_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals = units_per_product(vec![(a, 2), (b, 1), (a, 3)]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], 5);
        assert_eq!(totals[&b], 1);
    }

    #[test]
    fn test_filter_pagination_defaults() {
        let filter = SaleFilter::default();
        let pagination = filter.pagination();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 50);
    }
}
