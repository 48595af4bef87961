//! Manual inventory adjustments for products and raw materials

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    adjustment_difference, AdjustmentType, InventoryAdjustment, ItemKind, MovementKind,
    StockValuation,
};
use crate::services::products::lock_product;
use crate::services::raw_materials::{
    lock_raw_material, record_movement, store_valuation, MovementRecord,
};
use shared::{
    validate_product_stock_level, validate_raw_stock_level, PaginatedResponse, Pagination,
    PaginationMeta,
};

const ADJUSTMENT_SELECT: &str = r#"
    SELECT a.id, a.product_id, a.raw_material_id,
           COALESCE(p.name, rm.name, '') AS item_name,
           a.previous_stock, a.new_stock, a.difference, a.adjustment_type, a.reason,
           a.user_id, a.created_at
    FROM inventory_adjustments a
    LEFT JOIN products p ON p.id = a.product_id
    LEFT JOIN raw_materials rm ON rm.id = a.raw_material_id
"#;

/// Adjustment service
#[derive(Clone)]
pub struct AdjustmentService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentInput {
    pub product_id: Option<Uuid>,
    pub raw_material_id: Option<Uuid>,
    /// Counted stock after the correction
    pub new_stock: Decimal,
    pub adjustment_type: AdjustmentType,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustmentFilter {
    pub item_kind: Option<ItemKind>,
    pub adjustment_type: Option<AdjustmentType>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AdjustmentFilter {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// The single item an adjustment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentTarget {
    Product(Uuid),
    RawMaterial(Uuid),
}

impl AdjustmentTarget {
    /// Exactly one of the two references must be present
    pub fn from_ids(product_id: Option<Uuid>, raw_material_id: Option<Uuid>) -> AppResult<Self> {
        match (product_id, raw_material_id) {
            (Some(id), None) => Ok(AdjustmentTarget::Product(id)),
            (None, Some(id)) => Ok(AdjustmentTarget::RawMaterial(id)),
            _ => Err(AppError::validation(
                "product_id",
                "Choose exactly one product or raw material",
                "Debe indicar un producto o una materia prima, no ambos",
            )),
        }
    }
}

impl AdjustmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Set an item's stock to a counted value and record the difference
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateAdjustmentInput,
    ) -> AppResult<InventoryAdjustment> {
        input.validate()?;
        let target = AdjustmentTarget::from_ids(input.product_id, input.raw_material_id)?;

        let mut tx = self.db.begin().await?;

        let (previous, item_name) = match target {
            AdjustmentTarget::Product(product_id) => {
                let new_stock = validate_product_stock_level(input.new_stock).map_err(|e| {
                    AppError::validation(
                        "new_stock",
                        e,
                        "El stock de un producto debe ser un número entero no negativo",
                    )
                })?;
                let product = lock_product(&mut tx, product_id).await?;

                sqlx::query("UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2")
                    .bind(new_stock)
                    .bind(product_id)
                    .execute(&mut *tx)
                    .await?;

                (Decimal::from(product.stock), product.name)
            }
            AdjustmentTarget::RawMaterial(raw_material_id) => {
                validate_raw_stock_level(input.new_stock).map_err(|e| {
                    AppError::validation("new_stock", e, "El stock no puede ser negativo")
                })?;
                let raw = lock_raw_material(&mut tx, raw_material_id).await?;

                let before = StockValuation::new(raw.current_stock, raw.unit_cost);
                let after = StockValuation::new(input.new_stock, raw.unit_cost);
                store_valuation(&mut tx, raw_material_id, after).await?;
                record_movement(
                    &mut tx,
                    MovementRecord {
                        raw_material_id,
                        kind: MovementKind::Adjustment,
                        quantity: adjustment_difference(before.stock, after.stock).abs(),
                        before,
                        after,
                        reason: Some(input.reason.as_str()),
                        reference: None,
                        user_id: Some(user_id),
                    },
                )
                .await?;

                (raw.current_stock, raw.name)
            }
        };

        let difference = adjustment_difference(previous, input.new_stock);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO inventory_adjustments (
                product_id, raw_material_id, previous_stock, new_stock, difference,
                adjustment_type, reason, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(input.product_id)
        .bind(input.raw_material_id)
        .bind(previous)
        .bind(input.new_stock)
        .bind(difference)
        .bind(input.adjustment_type)
        .bind(&input.reason)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let adjustment = sqlx::query_as::<_, InventoryAdjustment>(&format!(
            "{} WHERE a.id = $1",
            ADJUSTMENT_SELECT
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            adjustment_id = %id,
            item = %item_name,
            previous = %previous,
            new = %input.new_stock,
            adjustment_type = adjustment.type_label(),
            "Inventory adjusted"
        );

        Ok(adjustment)
    }

    pub async fn list(
        &self,
        filter: &AdjustmentFilter,
    ) -> AppResult<PaginatedResponse<InventoryAdjustment>> {
        let pagination = filter.pagination();
        let kind = filter.item_kind.map(|k| match k {
            ItemKind::Product => "product",
            ItemKind::RawMaterial => "raw_material",
        });

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM inventory_adjustments a
            WHERE ($1::text IS NULL
                   OR ($1 = 'product' AND a.product_id IS NOT NULL)
                   OR ($1 = 'raw_material' AND a.raw_material_id IS NOT NULL))
              AND ($2::adjustment_type IS NULL OR a.adjustment_type = $2)
            "#,
        )
        .bind(kind)
        .bind(filter.adjustment_type)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, InventoryAdjustment>(&format!(
            r#"
            {}
            WHERE ($1::text IS NULL
                   OR ($1 = 'product' AND a.product_id IS NOT NULL)
                   OR ($1 = 'raw_material' AND a.raw_material_id IS NOT NULL))
              AND ($2::adjustment_type IS NULL OR a.adjustment_type = $2)
            ORDER BY a.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            ADJUSTMENT_SELECT
        ))
        .bind(kind)
        .bind(filter.adjustment_type)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    pub async fn get(&self, adjustment_id: Uuid) -> AppResult<InventoryAdjustment> {
        sqlx::query_as::<_, InventoryAdjustment>(&format!("{} WHERE a.id = $1", ADJUSTMENT_SELECT))
            .bind(adjustment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Adjustment {}", adjustment_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_exactly_one_item() {
        let id = Uuid::new_v4();
        assert_eq!(
            AdjustmentTarget::from_ids(Some(id), None).unwrap(),
            AdjustmentTarget::Product(id)
        );
        assert_eq!(
            AdjustmentTarget::from_ids(None, Some(id)).unwrap(),
            AdjustmentTarget::RawMaterial(id)
        );
        assert!(AdjustmentTarget::from_ids(None, None).is_err());
        assert!(AdjustmentTarget::from_ids(Some(id), Some(id)).is_err());
    }
}
