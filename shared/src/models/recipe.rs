//! Recipe (bill of materials) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{round_cost, round_quantity};

/// A recipe producing one kilogram of finished product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A raw material and the quantity used per kilogram of product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub quantity_per_kg: Decimal,
    pub unit_cost: Decimal,
}

impl RecipeIngredient {
    pub fn cost_per_kg(&self) -> Decimal {
        self.quantity_per_kg * self.unit_cost
    }
}

/// Cost of one kilogram of product, `Σ quantity × unit cost`
pub fn recipe_cost_per_kg(ingredients: &[RecipeIngredient]) -> Decimal {
    round_cost(ingredients.iter().map(RecipeIngredient::cost_per_kg).sum())
}

/// Raw material used to make `units` units weighing `unit_weight_kg` each
pub fn ingredient_consumption(quantity_per_kg: Decimal, unit_weight_kg: Decimal, units: i32) -> Decimal {
    round_quantity(quantity_per_kg * unit_weight_kg * Decimal::from(units))
}
