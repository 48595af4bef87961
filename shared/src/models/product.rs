//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::{margin_percent, MarginState, StockStatus};
use crate::types::round_cost;

/// Default minimum stock for new products
pub const DEFAULT_MINIMUM_STOCK: i32 = 5;

/// A product in the retail catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    /// Unit cost for products bought ready to sell
    pub base_cost: Decimal,
    /// Units on hand, never negative
    pub stock: i32,
    pub minimum_stock: i32,
    /// Bulk material this product is repacked from
    pub raw_material_id: Option<Uuid>,
    /// Pack size in grams for repacked and recipe products
    pub fraction_grams: Option<Decimal>,
    pub recipe_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a product is sourced, which decides how its cost is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductSourcing {
    /// Made from a recipe; one unit weighs `unit_weight_kg`
    Recipe {
        recipe_id: Uuid,
        unit_weight_kg: Decimal,
    },
    /// Repacked from a bulk raw material in packs of `fraction_grams`
    Fractioned {
        raw_material_id: Uuid,
        fraction_grams: Decimal,
    },
    /// Bought ready to sell at `base_cost`
    Direct,
}

/// Weight of one unit in kilograms, 1 kg when no pack size is set
pub fn unit_weight_kg(fraction_grams: Option<Decimal>) -> Decimal {
    match fraction_grams {
        Some(grams) if grams > Decimal::ZERO => grams / dec!(1000),
        _ => Decimal::ONE,
    }
}

impl Product {
    pub fn sourcing(&self) -> ProductSourcing {
        if let Some(recipe_id) = self.recipe_id {
            return ProductSourcing::Recipe {
                recipe_id,
                unit_weight_kg: unit_weight_kg(self.fraction_grams),
            };
        }
        match (self.raw_material_id, self.fraction_grams) {
            (Some(raw_material_id), Some(fraction_grams)) if fraction_grams > Decimal::ZERO => {
                ProductSourcing::Fractioned {
                    raw_material_id,
                    fraction_grams,
                }
            }
            _ => ProductSourcing::Direct,
        }
    }

    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.stock, self.minimum_stock)
    }
}

/// Inputs needed to price one unit of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostBasis {
    Recipe {
        cost_per_kg: Decimal,
        unit_weight_kg: Decimal,
    },
    Fractioned {
        raw_unit_cost: Decimal,
        fraction_grams: Decimal,
    },
    Base(Decimal),
}

impl CostBasis {
    /// Cost of one sellable unit, to four decimal places
    pub fn unit_cost(&self) -> Decimal {
        match *self {
            CostBasis::Recipe {
                cost_per_kg,
                unit_weight_kg,
            } => round_cost(cost_per_kg * unit_weight_kg),
            CostBasis::Fractioned {
                raw_unit_cost,
                fraction_grams,
            } => round_cost(raw_unit_cost * fraction_grams / dec!(1000)),
            CostBasis::Base(cost) => round_cost(cost),
        }
    }
}

/// Product together with its derived unit cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub margin_state: MarginState,
    pub stock_status: StockStatus,
}

impl PricedProduct {
    pub fn new(product: Product, unit_cost: Decimal) -> Self {
        let margin = margin_percent(product.price, unit_cost);
        let stock_status = product.stock_status();
        Self {
            product,
            unit_cost,
            margin_percent: margin,
            margin_state: MarginState::classify(margin),
            stock_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Granola 500g".to_string(),
            description: None,
            category: Some("cereales".to_string()),
            price: dec!(4500),
            base_cost: dec!(2000),
            stock: 12,
            minimum_stock: 5,
            raw_material_id: None,
            fraction_grams: None,
            recipe_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_weight() {
        assert_eq!(unit_weight_kg(Some(dec!(250))), dec!(0.25));
        assert_eq!(unit_weight_kg(None), Decimal::ONE);
        assert_eq!(unit_weight_kg(Some(Decimal::ZERO)), Decimal::ONE);
    }

    #[test]
    fn test_sourcing_recipe_wins() {
        let mut p = product();
        let recipe_id = Uuid::new_v4();
        p.recipe_id = Some(recipe_id);
        p.fraction_grams = Some(dec!(500));
        assert_eq!(
            p.sourcing(),
            ProductSourcing::Recipe {
                recipe_id,
                unit_weight_kg: dec!(0.5)
            }
        );
    }

    #[test]
    fn test_sourcing_fractioned_needs_pack_size() {
        let mut p = product();
        p.raw_material_id = Some(Uuid::new_v4());
        assert_eq!(p.sourcing(), ProductSourcing::Direct);

        p.fraction_grams = Some(dec!(100));
        assert!(matches!(p.sourcing(), ProductSourcing::Fractioned { .. }));
    }

    #[test]
    fn test_cost_basis() {
        let recipe = CostBasis::Recipe {
            cost_per_kg: dec!(8000),
            unit_weight_kg: dec!(0.5),
        };
        assert_eq!(recipe.unit_cost(), dec!(4000));

        let fractioned = CostBasis::Fractioned {
            raw_unit_cost: dec!(12000),
            fraction_grams: dec!(250),
        };
        assert_eq!(fractioned.unit_cost(), dec!(3000));

        assert_eq!(CostBasis::Base(dec!(1999.99)).unit_cost(), dec!(1999.99));
    }

    #[test]
    fn test_priced_product() {
        let priced = PricedProduct::new(product(), dec!(2000));
        assert_eq!(priced.margin_percent, dec!(55.56));
        assert_eq!(priced.margin_state, MarginState::Optimal);
        assert_eq!(priced.stock_status, StockStatus::Normal);
    }
}
