//! Read-only sync feeds for the point-of-sale and storefront clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::products::{cost_basis, find_product, raw_requirements};
use shared::{margin_percent, round_money, MarginState};

/// Sync service
#[derive(Clone)]
pub struct SyncService {
    db: PgPool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SyncProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SyncRawMaterial {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub unit_cost: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SyncSale {
    pub id: Uuid,
    pub sold_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub total: Decimal,
    pub lines: i64,
    pub units: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductPrice {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub margin_state: MarginState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawShortage {
    pub raw_material_id: Uuid,
    pub name: String,
    pub required: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StockCheck {
    pub product_id: Uuid,
    pub quantity: i32,
    pub available: i32,
    pub product_ok: bool,
    /// Whether the product is made from raw materials
    pub has_materials: bool,
    pub materials_ok: bool,
    pub shortages: Vec<RawShortage>,
}

impl SyncService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Active products for a price list
    pub async fn products(&self) -> AppResult<Vec<SyncProduct>> {
        let products = sqlx::query_as::<_, SyncProduct>(
            r#"
            SELECT id, name, price, stock, category
            FROM products
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    /// Active raw materials with stock and cost
    pub async fn inventory(&self) -> AppResult<Vec<SyncRawMaterial>> {
        let materials = sqlx::query_as::<_, SyncRawMaterial>(
            r#"
            SELECT id, name, unit, current_stock, minimum_stock, unit_cost
            FROM raw_materials
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(materials)
    }

    /// Most recent active sales
    pub async fn sales(&self, limit: i64) -> AppResult<Vec<SyncSale>> {
        let sales = sqlx::query_as::<_, SyncSale>(
            r#"
            SELECT s.id, s.sold_at, s.customer_name, s.total,
                   COUNT(sl.id) AS lines,
                   COALESCE(SUM(sl.quantity), 0)::BIGINT AS units
            FROM sales s
            LEFT JOIN sale_lines sl ON sl.sale_id = s.id
            WHERE NOT s.is_deleted
            GROUP BY s.id
            ORDER BY s.sold_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.db)
        .await?;
        Ok(sales)
    }

    pub async fn price(&self, product_id: Uuid) -> AppResult<ProductPrice> {
        let mut conn = self.db.acquire().await?;
        let product = find_product(&mut conn, product_id).await?;
        let unit_cost = cost_basis(&mut conn, &product).await?.unit_cost();
        let margin = margin_percent(product.price, unit_cost);

        Ok(ProductPrice {
            product_id,
            name: product.name,
            price: product.price,
            unit_cost: round_money(unit_cost),
            margin_percent: margin,
            margin_state: MarginState::classify(margin),
        })
    }

    /// Whether `quantity` units can be sold from stock, and whether the raw
    /// materials to make that many are on hand
    pub async fn verify_stock(&self, product_id: Uuid, quantity: i32) -> AppResult<StockCheck> {
        if quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
                "La cantidad debe ser positiva",
            ));
        }

        let mut conn = self.db.acquire().await?;
        let product = find_product(&mut conn, product_id).await?;
        let requirements = raw_requirements(&mut conn, &product, quantity).await?;

        let mut shortages = Vec::new();
        for (raw_material_id, required) in &requirements {
            let row: Option<(String, Decimal)> =
                sqlx::query_as("SELECT name, current_stock FROM raw_materials WHERE id = $1")
                    .bind(raw_material_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            let (name, available) = row.unwrap_or_else(|| (String::new(), Decimal::ZERO));
            if available < *required {
                shortages.push(RawShortage {
                    raw_material_id: *raw_material_id,
                    name,
                    required: *required,
                    available,
                });
            }
        }

        Ok(StockCheck {
            product_id,
            quantity,
            available: product.stock,
            product_ok: product.stock >= quantity,
            has_materials: !requirements.is_empty(),
            materials_ok: shortages.is_empty(),
            shortages,
        })
    }
}
