//! Product catalog, effective unit cost, production and pricing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    ingredient_consumption, recipe_cost_per_kg, CostBasis, MovementKind, PricedProduct, Product,
    ProductSourcing, StockValuation, DEFAULT_MINIMUM_STOCK,
};
use crate::services::profitability::load_cost_settings;
use crate::services::raw_materials::{
    lock_raw_material, record_movement, store_valuation, MovementRecord,
};
use crate::services::recipes::load_ingredients;
use shared::{
    margin_percent, round_quantity, suggested_price, validate_cost, validate_price,
    validate_product_sourcing, MarginState,
};

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.category, p.price, \
     p.base_cost, p.stock, p.minimum_stock, p.raw_material_id, p.fraction_grams, p.recipe_id, \
     p.is_active, p.created_at, p.updated_at";

/// SQL expression for the effective unit cost of the product aliased `p`.
///
/// Mirrors `CostBasis::unit_cost`: recipe cost per kg times unit weight,
/// raw material cost times pack size, or the base cost.
pub(crate) const UNIT_COST_SQL: &str = r#"
    CASE
        WHEN p.recipe_id IS NOT NULL THEN ROUND(
            ROUND(COALESCE((
                SELECT SUM(ri.quantity_per_kg * rmi.unit_cost)
                FROM recipe_ingredients ri
                JOIN raw_materials rmi ON rmi.id = ri.raw_material_id
                WHERE ri.recipe_id = p.recipe_id
            ), 0), 4)
            * CASE WHEN p.fraction_grams > 0 THEN p.fraction_grams / 1000 ELSE 1 END,
            4)
        WHEN p.raw_material_id IS NOT NULL AND p.fraction_grams > 0 THEN ROUND(
            COALESCE((SELECT rmf.unit_cost FROM raw_materials rmf WHERE rmf.id = p.raw_material_id), 0)
            * p.fraction_grams / 1000,
            4)
        ELSE p.base_cost
    END"#;

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product row joined with its effective unit cost
#[derive(Debug, FromRow)]
pub(crate) struct CostedProductRow {
    #[sqlx(flatten)]
    pub product: Product,
    pub unit_cost: Decimal,
}

impl From<CostedProductRow> for PricedProduct {
    fn from(row: CostedProductRow) -> Self {
        PricedProduct::new(row.product, row.unit_cost)
    }
}

/// Product list filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub price: Decimal,
    pub base_cost: Option<Decimal>,
    pub stock: Option<i32>,
    pub minimum_stock: Option<i32>,
    pub raw_material_id: Option<Uuid>,
    pub fraction_grams: Option<Decimal>,
    pub recipe_id: Option<Uuid>,
}

/// Catalog fields of a product. Stock is changed through sales, production
/// and adjustments; price through [`ProductService::apply_price`] or here.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub base_cost: Option<Decimal>,
    pub minimum_stock: Option<i32>,
    pub raw_material_id: Option<Uuid>,
    pub fraction_grams: Option<Decimal>,
    pub recipe_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Effective cost of a product and how it was derived
#[derive(Debug, Clone, Serialize)]
pub struct ProductCost {
    pub product_id: Uuid,
    pub name: String,
    pub sourcing: ProductSourcing,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub margin_state: MarginState,
    pub target_margin: Decimal,
    pub suggested_price: Decimal,
    /// Cost of one kilogram when the product is made from a recipe
    pub recipe_cost_per_kg: Option<Decimal>,
    /// Raw material unit cost when the product is repacked
    pub raw_unit_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ProductionInput {
    pub units: i32,
    pub notes: Option<String>,
}

/// Raw material used by a production run
#[derive(Debug, Clone, Serialize)]
pub struct Consumption {
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub quantity: Decimal,
    pub stock_after: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionResult {
    pub product_id: Uuid,
    pub units: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub consumptions: Vec<Consumption>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyPriceInput {
    pub price: Decimal,
}

/// Lock a product row for the rest of the transaction
pub(crate) async fn lock_product(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products p WHERE p.id = $1 FOR UPDATE",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

pub(crate) async fn find_product(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products p WHERE p.id = $1",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

/// How the unit cost of a product is derived right now
pub(crate) async fn cost_basis(conn: &mut PgConnection, product: &Product) -> AppResult<CostBasis> {
    let basis = match product.sourcing() {
        ProductSourcing::Recipe {
            recipe_id,
            unit_weight_kg,
        } => {
            let ingredients = load_ingredients(conn, recipe_id).await?;
            CostBasis::Recipe {
                cost_per_kg: recipe_cost_per_kg(&ingredients),
                unit_weight_kg,
            }
        }
        ProductSourcing::Fractioned {
            raw_material_id,
            fraction_grams,
        } => {
            let raw_unit_cost: Option<Decimal> =
                sqlx::query_scalar("SELECT unit_cost FROM raw_materials WHERE id = $1")
                    .bind(raw_material_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            CostBasis::Fractioned {
                raw_unit_cost: raw_unit_cost.unwrap_or(Decimal::ZERO),
                fraction_grams,
            }
        }
        ProductSourcing::Direct => CostBasis::Base(product.base_cost),
    };
    Ok(basis)
}

fn invalid(field: &str, message: &str, message_es: &str) -> AppError {
    AppError::validation(field, message, message_es)
}

/// Raw material needed to make `units` units, as (raw material id, quantity)
/// in lock order. Products bought ready to sell need none.
pub(crate) async fn raw_requirements(
    conn: &mut PgConnection,
    product: &Product,
    units: i32,
) -> AppResult<Vec<(Uuid, Decimal)>> {
    let mut requirements: Vec<(Uuid, Decimal)> = match product.sourcing() {
        ProductSourcing::Recipe {
            recipe_id,
            unit_weight_kg,
        } => load_ingredients(conn, recipe_id)
            .await?
            .into_iter()
            .map(|i| {
                (
                    i.raw_material_id,
                    ingredient_consumption(i.quantity_per_kg, unit_weight_kg, units),
                )
            })
            .collect(),
        ProductSourcing::Fractioned {
            raw_material_id,
            fraction_grams,
        } => vec![(
            raw_material_id,
            round_quantity(fraction_grams / Decimal::from(1000) * Decimal::from(units)),
        )],
        ProductSourcing::Direct => Vec::new(),
    };
    requirements.sort_by_key(|(id, _)| *id);
    Ok(requirements)
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ProductFilter) -> AppResult<Vec<PricedProduct>> {
        let search = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", s.trim()));

        let rows = sqlx::query_as::<_, CostedProductRow>(&format!(
            r#"
            SELECT {}, {} AS unit_cost
            FROM products p
            WHERE (p.is_active OR $1)
              AND ($2::text IS NULL OR p.category = $2)
              AND ($3::text IS NULL OR p.name ILIKE $3)
            ORDER BY p.name
            "#,
            PRODUCT_COLUMNS, UNIT_COST_SQL
        ))
        .bind(filter.include_inactive)
        .bind(&filter.category)
        .bind(search)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(PricedProduct::from).collect())
    }

    pub async fn get(&self, product_id: Uuid) -> AppResult<PricedProduct> {
        sqlx::query_as::<_, CostedProductRow>(&format!(
            "SELECT {}, {} AS unit_cost FROM products p WHERE p.id = $1",
            PRODUCT_COLUMNS, UNIT_COST_SQL
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .map(PricedProduct::from)
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
    }

    pub async fn create(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;

        validate_price(input.price)
            .map_err(|e| invalid("price", e, "El precio debe ser mayor a cero"))?;
        let base_cost = input.base_cost.unwrap_or(Decimal::ZERO);
        validate_cost(base_cost)
            .map_err(|e| invalid("base_cost", e, "El costo no puede ser negativo"))?;
        validate_product_sourcing(input.raw_material_id, input.recipe_id, input.fraction_grams)
            .map_err(|e| {
                invalid(
                    "raw_material_id",
                    e,
                    "Origen del producto inválido (materia prima o receta)",
                )
            })?;

        let stock = input.stock.unwrap_or(0);
        let minimum = input.minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK);
        if stock < 0 || minimum < 0 {
            return Err(invalid(
                "stock",
                "Stock levels cannot be negative",
                "El stock no puede ser negativo",
            ));
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products AS p (
                name, description, category, price, base_cost, stock, minimum_stock,
                raw_material_id, fraction_grams, recipe_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(base_cost)
        .bind(stock)
        .bind(minimum)
        .bind(input.raw_material_id)
        .bind(input.fraction_grams)
        .bind(input.recipe_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    pub async fn update(&self, product_id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_product(&mut tx, product_id).await?;

        let price = input.price.unwrap_or(current.price);
        validate_price(price).map_err(|e| invalid("price", e, "El precio debe ser mayor a cero"))?;
        let base_cost = input.base_cost.unwrap_or(current.base_cost);
        validate_cost(base_cost)
            .map_err(|e| invalid("base_cost", e, "El costo no puede ser negativo"))?;

        let raw_material_id = input.raw_material_id.or(current.raw_material_id);
        let recipe_id = input.recipe_id.or(current.recipe_id);
        let fraction_grams = input.fraction_grams.or(current.fraction_grams);
        validate_product_sourcing(raw_material_id, recipe_id, fraction_grams).map_err(|e| {
            invalid(
                "raw_material_id",
                e,
                "Origen del producto inválido (materia prima o receta)",
            )
        })?;

        let minimum = input.minimum_stock.unwrap_or(current.minimum_stock);
        if minimum < 0 {
            return Err(invalid(
                "minimum_stock",
                "Minimum stock cannot be negative",
                "El stock mínimo no puede ser negativo",
            ));
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products AS p
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                category = COALESCE($3, category),
                price = $4,
                base_cost = $5,
                minimum_stock = $6,
                raw_material_id = $7,
                fraction_grams = $8,
                recipe_id = $9,
                is_active = COALESCE($10, is_active),
                updated_at = NOW()
            WHERE p.id = $11
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(&input.category)
        .bind(price)
        .bind(base_cost)
        .bind(minimum)
        .bind(raw_material_id)
        .bind(fraction_grams)
        .bind(recipe_id)
        .bind(input.is_active)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if price != current.price {
            tracing::info!(
                product_id = %product_id,
                old_price = %current.price,
                new_price = %price,
                "Product price changed"
            );
        }
        Ok(product)
    }

    /// Withdraw a product from sale. Sales history keeps referring to it.
    pub async fn delete(&self, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(product_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product {}", product_id)));
        }
        tracing::info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }

    /// Effective unit cost with margin and the price that meets the target
    pub async fn cost(&self, product_id: Uuid) -> AppResult<ProductCost> {
        let mut conn = self.db.acquire().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products p WHERE p.id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

        let basis = cost_basis(&mut conn, &product).await?;
        let settings = load_cost_settings(&mut *conn).await?;

        let unit_cost = basis.unit_cost();
        let margin = margin_percent(product.price, unit_cost);
        let (recipe_cost, raw_unit_cost) = match basis {
            CostBasis::Recipe { cost_per_kg, .. } => (Some(cost_per_kg), None),
            CostBasis::Fractioned { raw_unit_cost, .. } => (None, Some(raw_unit_cost)),
            CostBasis::Base(_) => (None, None),
        };

        Ok(ProductCost {
            product_id,
            sourcing: product.sourcing(),
            name: product.name,
            price: product.price,
            unit_cost,
            margin_percent: margin,
            margin_state: MarginState::classify(margin),
            target_margin: settings.target_margin,
            suggested_price: suggested_price(
                unit_cost,
                settings.target_margin,
                settings.round_prices,
            ),
            recipe_cost_per_kg: recipe_cost,
            raw_unit_cost,
        })
    }

    /// Produce `units` units of a product, consuming its raw materials.
    ///
    /// All consumptions are checked before any write; one short raw material
    /// aborts the whole run.
    pub async fn produce(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: ProductionInput,
    ) -> AppResult<ProductionResult> {
        if input.units <= 0 {
            return Err(invalid(
                "units",
                "Units to produce must be positive",
                "Las unidades a producir deben ser positivas",
            ));
        }

        let mut tx = self.db.begin().await?;
        let product = lock_product(&mut tx, product_id).await?;
        if !product.is_active {
            return Err(AppError::InvalidStateTransition(format!(
                "{} is inactive",
                product.name
            )));
        }

        let requirements = raw_requirements(&mut tx, &product, input.units).await?;

        let mut planned = Vec::with_capacity(requirements.len());
        let mut shortages = Vec::new();
        for (raw_material_id, quantity) in requirements {
            let raw = lock_raw_material(&mut tx, raw_material_id).await?;
            let before = StockValuation::new(raw.current_stock, raw.unit_cost);
            match before.consume(quantity) {
                Some(after) => planned.push((raw, quantity, before, after)),
                None => shortages.push(format!(
                    "{}: {} {} needed, {} available",
                    raw.name, quantity, raw.unit, raw.current_stock
                )),
            }
        }

        if !shortages.is_empty() {
            tracing::warn!(
                product_id = %product_id,
                units = input.units,
                shortages = shortages.len(),
                "Production rejected"
            );
            return Err(AppError::InsufficientInventory(shortages.join("; ")));
        }

        let reason = input
            .notes
            .clone()
            .unwrap_or_else(|| format!("Production of {} x {}", input.units, product.name));
        let mut consumptions = Vec::with_capacity(planned.len());
        for (raw, quantity, before, after) in planned {
            store_valuation(&mut tx, raw.id, after).await?;
            record_movement(
                &mut tx,
                MovementRecord {
                    raw_material_id: raw.id,
                    kind: MovementKind::Exit,
                    quantity,
                    before,
                    after,
                    reason: Some(reason.as_str()),
                    reference: Some(("production", product_id)),
                    user_id: Some(user_id),
                },
            )
            .await?;
            consumptions.push(Consumption {
                raw_material_id: raw.id,
                raw_material_name: raw.name,
                quantity,
                stock_after: after.stock,
            });
        }

        let new_stock: i32 = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2 RETURNING stock",
        )
        .bind(input.units)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            units = input.units,
            new_stock,
            raw_materials = consumptions.len(),
            "Production recorded"
        );

        Ok(ProductionResult {
            product_id,
            units: input.units,
            previous_stock: product.stock,
            new_stock,
            consumptions,
        })
    }

    /// Set a new selling price, typically a suggested one
    pub async fn apply_price(&self, product_id: Uuid, price: Decimal) -> AppResult<Product> {
        validate_price(price).map_err(|e| invalid("price", e, "El precio debe ser mayor a cero"))?;

        let mut tx = self.db.begin().await?;
        let current = lock_product(&mut tx, product_id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products AS p SET price = $1, updated_at = NOW() WHERE p.id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(price)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            old_price = %current.price,
            new_price = %price,
            "Suggested price applied"
        );
        Ok(product)
    }
}
