//! Raw material catalog, stock movements and low-stock listing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{MovementKind, RawMaterial, RawMaterialMovement, StockValuation};
use shared::StockStatus;

const RAW_MATERIAL_COLUMNS: &str = "id, name, supplier, unit, unit_cost, current_stock, \
     minimum_stock, is_active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, raw_material_id, kind, quantity, stock_before, stock_after, \
     cost_before, cost_after, reason, reference_kind, reference_id, user_id, created_at";

/// Raw material service
#[derive(Clone)]
pub struct RawMaterialService {
    db: PgPool,
}

/// Input for creating a raw material
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRawMaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub current_stock: Option<Decimal>,
    pub minimum_stock: Option<Decimal>,
}

/// Input for updating a raw material.
///
/// Stock and cost are not editable here: stock changes go through purchases,
/// production and adjustments so that every change leaves a movement.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRawMaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub minimum_stock: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Raw material below its minimum stock
#[derive(Debug, Clone, Serialize)]
pub struct LowStockRawMaterial {
    #[serde(flatten)]
    pub raw_material: RawMaterial,
    pub status: StockStatus,
    pub shortfall: Decimal,
}

/// A stock change about to be written to the movement log
#[derive(Debug, Clone)]
pub struct MovementRecord<'a> {
    pub raw_material_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub before: StockValuation,
    pub after: StockValuation,
    pub reason: Option<&'a str>,
    pub reference: Option<(&'a str, Uuid)>,
    pub user_id: Option<Uuid>,
}

/// Lock a raw material row for the rest of the transaction
pub(crate) async fn lock_raw_material(
    conn: &mut PgConnection,
    raw_material_id: Uuid,
) -> AppResult<RawMaterial> {
    sqlx::query_as::<_, RawMaterial>(&format!(
        "SELECT {} FROM raw_materials WHERE id = $1 FOR UPDATE",
        RAW_MATERIAL_COLUMNS
    ))
    .bind(raw_material_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Raw material {}", raw_material_id)))
}

/// Write a new stock and unit cost for a locked raw material
pub(crate) async fn store_valuation(
    conn: &mut PgConnection,
    raw_material_id: Uuid,
    valuation: StockValuation,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE raw_materials
        SET current_stock = $1, unit_cost = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(valuation.stock)
    .bind(valuation.unit_cost)
    .bind(raw_material_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Append a row to the raw material movement log
pub(crate) async fn record_movement(
    conn: &mut PgConnection,
    movement: MovementRecord<'_>,
) -> AppResult<RawMaterialMovement> {
    let (reference_kind, reference_id) = match movement.reference {
        Some((kind, id)) => (Some(kind), Some(id)),
        None => (None, None),
    };

    let row = sqlx::query_as::<_, RawMaterialMovement>(&format!(
        r#"
        INSERT INTO raw_material_movements (
            raw_material_id, kind, quantity, stock_before, stock_after,
            cost_before, cost_after, reason, reference_kind, reference_id, user_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(movement.raw_material_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.before.stock)
    .bind(movement.after.stock)
    .bind(movement.before.unit_cost)
    .bind(movement.after.unit_cost)
    .bind(movement.reason)
    .bind(reference_kind)
    .bind(reference_id)
    .bind(movement.user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

impl RawMaterialService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List raw materials, active ones only unless asked otherwise
    pub async fn list(&self, include_inactive: bool) -> AppResult<Vec<RawMaterial>> {
        let rows = sqlx::query_as::<_, RawMaterial>(&format!(
            "SELECT {} FROM raw_materials WHERE is_active OR $1 ORDER BY name",
            RAW_MATERIAL_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, raw_material_id: Uuid) -> AppResult<RawMaterial> {
        sqlx::query_as::<_, RawMaterial>(&format!(
            "SELECT {} FROM raw_materials WHERE id = $1",
            RAW_MATERIAL_COLUMNS
        ))
        .bind(raw_material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Raw material {}", raw_material_id)))
    }

    /// Create a raw material. An opening stock is logged as an adjustment.
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateRawMaterialInput,
    ) -> AppResult<RawMaterial> {
        input.validate()?;

        let unit_cost = input.unit_cost.unwrap_or(Decimal::ZERO);
        let stock = input.current_stock.unwrap_or(Decimal::ZERO);
        let minimum = input.minimum_stock.unwrap_or(Decimal::ZERO);

        if unit_cost < Decimal::ZERO {
            return Err(AppError::validation(
                "unit_cost",
                "Unit cost cannot be negative",
                "El costo unitario no puede ser negativo",
            ));
        }
        if stock < Decimal::ZERO || minimum < Decimal::ZERO {
            return Err(AppError::validation(
                "current_stock",
                "Stock levels cannot be negative",
                "El stock no puede ser negativo",
            ));
        }

        let mut tx = self.db.begin().await?;

        let raw_material = sqlx::query_as::<_, RawMaterial>(&format!(
            r#"
            INSERT INTO raw_materials (name, supplier, unit, unit_cost, current_stock, minimum_stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RAW_MATERIAL_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.supplier)
        .bind(input.unit.as_deref().unwrap_or("kg"))
        .bind(unit_cost)
        .bind(stock)
        .bind(minimum)
        .fetch_one(&mut *tx)
        .await?;

        if stock > Decimal::ZERO {
            record_movement(
                &mut tx,
                MovementRecord {
                    raw_material_id: raw_material.id,
                    kind: MovementKind::Adjustment,
                    quantity: stock,
                    before: StockValuation::new(Decimal::ZERO, unit_cost),
                    after: StockValuation::new(stock, unit_cost),
                    reason: Some("Opening stock"),
                    reference: None,
                    user_id: Some(user_id),
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(raw_material_id = %raw_material.id, name = %raw_material.name, "Raw material created");
        Ok(raw_material)
    }

    pub async fn update(
        &self,
        raw_material_id: Uuid,
        input: UpdateRawMaterialInput,
    ) -> AppResult<RawMaterial> {
        input.validate()?;

        if matches!(input.minimum_stock, Some(m) if m < Decimal::ZERO) {
            return Err(AppError::validation(
                "minimum_stock",
                "Minimum stock cannot be negative",
                "El stock mínimo no puede ser negativo",
            ));
        }

        sqlx::query_as::<_, RawMaterial>(&format!(
            r#"
            UPDATE raw_materials
            SET name = COALESCE($1, name),
                supplier = COALESCE($2, supplier),
                unit = COALESCE($3, unit),
                minimum_stock = COALESCE($4, minimum_stock),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            RAW_MATERIAL_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.supplier)
        .bind(&input.unit)
        .bind(input.minimum_stock)
        .bind(input.is_active)
        .bind(raw_material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Raw material {}", raw_material_id)))
    }

    /// Movement log of a raw material, newest first
    pub async fn movements(
        &self,
        raw_material_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<RawMaterialMovement>> {
        self.get(raw_material_id).await?;

        let rows = sqlx::query_as::<_, RawMaterialMovement>(&format!(
            r#"
            SELECT {}
            FROM raw_material_movements
            WHERE raw_material_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(raw_material_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Active raw materials at or below their minimum stock
    pub async fn low_stock(&self) -> AppResult<Vec<LowStockRawMaterial>> {
        let rows = sqlx::query_as::<_, RawMaterial>(&format!(
            r#"
            SELECT {}
            FROM raw_materials
            WHERE is_active AND current_stock <= minimum_stock
            ORDER BY current_stock - minimum_stock, name
            "#,
            RAW_MATERIAL_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|raw_material| LowStockRawMaterial {
                status: StockStatus::classify_decimal(
                    raw_material.current_stock,
                    raw_material.minimum_stock,
                ),
                shortfall: (raw_material.minimum_stock - raw_material.current_stock)
                    .max(Decimal::ZERO),
                raw_material,
            })
            .collect())
    }
}
