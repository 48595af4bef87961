//! Business-rule validation for the LINO back-office
//!
//! Transaction validators collect every problem instead of stopping at the
//! first one, so a cashier sees all bad lines of a sale at once.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PurchaseLineInput, SaleLineInput};

/// Largest quantity accepted on one purchase line
pub const MAX_PURCHASE_QUANTITY: Decimal = dec!(10000);

/// Largest total accepted on one purchase line
pub const MAX_PURCHASE_TOTAL: Decimal = dec!(1000000);

/// Smallest unit price a purchase line may imply
pub const MIN_PURCHASE_UNIT_PRICE: Decimal = dec!(0.01);

/// Every rule a transaction broke, in input order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.join("; "))]
pub struct RuleViolations(pub Vec<String>);

impl RuleViolations {
    fn into_result(self) -> Result<(), RuleViolations> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

// ============================================================================
// Transaction Validations
// ============================================================================

/// Product state needed to check a sale line
#[derive(Debug, Clone)]
pub struct ProductStockView {
    pub name: String,
    pub stock: i32,
    pub is_active: bool,
}

/// Validate all lines of a sale against current stock.
///
/// Quantities of the same product on several lines are added together before
/// comparing with stock.
pub fn validate_sale_lines<F>(lines: &[SaleLineInput], lookup: F) -> Result<(), RuleViolations>
where
    F: Fn(Uuid) -> Option<ProductStockView>,
{
    let mut errors = Vec::new();

    if lines.is_empty() {
        errors.push("A sale needs at least one line".to_string());
        return RuleViolations(errors).into_result();
    }

    let mut requested: HashMap<Uuid, i64> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let n = index + 1;
        let Some(product) = lookup(line.product_id) else {
            errors.push(format!("Line {}: product {} does not exist", n, line.product_id));
            continue;
        };

        if !product.is_active {
            errors.push(format!("Line {}: {} is no longer sold", n, product.name));
        }
        if line.quantity <= 0 {
            errors.push(format!("Line {}: quantity for {} must be positive", n, product.name));
            continue;
        }
        if let Some(price) = line.unit_price {
            if price < Decimal::ZERO {
                errors.push(format!("Line {}: price for {} cannot be negative", n, product.name));
            }
        }

        let total = requested.entry(line.product_id).or_insert(0);
        if *total == 0 {
            order.push(line.product_id);
        }
        *total += i64::from(line.quantity);
    }

    for product_id in order {
        let (Some(product), Some(quantity)) = (lookup(product_id), requested.get(&product_id)) else {
            continue;
        };
        if i64::from(product.stock) < *quantity {
            errors.push(format!(
                "Insufficient stock for {}: {} available, {} requested",
                product.name, product.stock, quantity
            ));
        }
    }

    RuleViolations(errors).into_result()
}

/// Validate all lines of a purchase
pub fn validate_purchase_lines(lines: &[PurchaseLineInput]) -> Result<(), RuleViolations> {
    let mut errors = Vec::new();

    if lines.is_empty() {
        errors.push("A purchase needs at least one line".to_string());
        return RuleViolations(errors).into_result();
    }

    for (index, line) in lines.iter().enumerate() {
        let n = index + 1;
        if line.quantity <= Decimal::ZERO {
            errors.push(format!("Line {}: quantity must be positive", n));
        } else if line.quantity > MAX_PURCHASE_QUANTITY {
            errors.push(format!(
                "Line {}: quantity exceeds the maximum of {}",
                n, MAX_PURCHASE_QUANTITY
            ));
        }

        if line.total_price <= Decimal::ZERO {
            errors.push(format!("Line {}: total must be positive", n));
        } else if line.total_price > MAX_PURCHASE_TOTAL {
            errors.push(format!(
                "Line {}: total exceeds the maximum of {}",
                n, MAX_PURCHASE_TOTAL
            ));
        }

        if line.quantity > Decimal::ZERO
            && line.total_price > Decimal::ZERO
            && line.unit_price() < MIN_PURCHASE_UNIT_PRICE
        {
            errors.push(format!(
                "Line {}: unit price must be at least {}",
                n, MIN_PURCHASE_UNIT_PRICE
            ));
        }
    }

    RuleViolations(errors).into_result()
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate a selling price
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price <= Decimal::ZERO {
        return Err("Price must be greater than zero");
    }
    Ok(())
}

/// Validate a unit cost
pub fn validate_cost(cost: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Cost cannot be negative");
    }
    Ok(())
}

/// Validate a counted product stock, which must be a whole number of units
pub fn validate_product_stock_level(stock: Decimal) -> Result<i32, &'static str> {
    if stock < Decimal::ZERO {
        return Err("Stock cannot be negative");
    }
    if stock.fract() != Decimal::ZERO {
        return Err("Product stock must be a whole number of units");
    }
    stock.to_i32().ok_or("Stock is out of range")
}

/// Validate a counted raw material stock
pub fn validate_raw_stock_level(stock: Decimal) -> Result<(), &'static str> {
    if stock < Decimal::ZERO {
        return Err("Stock cannot be negative");
    }
    Ok(())
}

/// Validate how a product links to raw materials and recipes
pub fn validate_product_sourcing(
    raw_material_id: Option<Uuid>,
    recipe_id: Option<Uuid>,
    fraction_grams: Option<Decimal>,
) -> Result<(), &'static str> {
    if raw_material_id.is_some() && recipe_id.is_some() {
        return Err("A product cannot be both repacked and made from a recipe");
    }
    if let Some(grams) = fraction_grams {
        if grams <= Decimal::ZERO {
            return Err("Pack size must be greater than zero grams");
        }
    }
    if raw_material_id.is_some() && fraction_grams.is_none() {
        return Err("A repacked product needs a pack size in grams");
    }
    Ok(())
}

/// Validate recipe ingredients: `(raw_material_id, quantity_per_kg)` pairs
pub fn validate_recipe_ingredients(ingredients: &[(Uuid, Decimal)]) -> Result<(), RuleViolations> {
    let mut errors = Vec::new();
    if ingredients.is_empty() {
        errors.push("A recipe needs at least one ingredient".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for (index, (raw_material_id, quantity)) in ingredients.iter().enumerate() {
        if *quantity <= Decimal::ZERO {
            errors.push(format!("Ingredient {}: quantity must be positive", index + 1));
        }
        if !seen.insert(*raw_material_id) {
            errors.push(format!(
                "Ingredient {}: raw material {} is listed twice",
                index + 1,
                raw_material_id
            ));
        }
    }

    RuleViolations(errors).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_line(product_id: Uuid, quantity: i32) -> SaleLineInput {
        SaleLineInput {
            product_id,
            quantity,
            unit_price: None,
        }
    }

    fn stock_of(stock: i32) -> impl Fn(Uuid) -> Option<ProductStockView> {
        move |_| {
            Some(ProductStockView {
                name: "Pasas".to_string(),
                stock,
                is_active: true,
            })
        }
    }

    // ========================================================================
    // Sale Validation Tests
    // ========================================================================

    #[test]
    fn test_sale_within_stock() {
        let id = Uuid::new_v4();
        assert!(validate_sale_lines(&[sale_line(id, 3)], stock_of(3)).is_ok());
    }

    #[test]
    fn test_sale_empty() {
        let err = validate_sale_lines(&[], stock_of(3)).unwrap_err();
        assert_eq!(err.0.len(), 1);
    }

    #[test]
    fn test_sale_insufficient_stock_across_lines() {
        let id = Uuid::new_v4();
        let lines = [sale_line(id, 2), sale_line(id, 2)];
        let err = validate_sale_lines(&lines, stock_of(3)).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert!(err.0[0].contains("Insufficient stock"));
    }

    #[test]
    fn test_sale_collects_every_error() {
        let lines = [
            sale_line(Uuid::new_v4(), 0),
            SaleLineInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: Some(dec!(-1)),
            },
        ];
        let err = validate_sale_lines(&lines, stock_of(10)).unwrap_err();
        assert_eq!(err.0.len(), 2);
    }

    #[test]
    fn test_sale_unknown_product() {
        let err = validate_sale_lines(&[sale_line(Uuid::new_v4(), 1)], |_| None).unwrap_err();
        assert!(err.0[0].contains("does not exist"));
    }

    // ========================================================================
    // Purchase Validation Tests
    // ========================================================================

    fn purchase_line(quantity: Decimal, total_price: Decimal) -> PurchaseLineInput {
        PurchaseLineInput {
            raw_material_id: Uuid::new_v4(),
            quantity,
            total_price,
        }
    }

    #[test]
    fn test_purchase_valid() {
        assert!(validate_purchase_lines(&[purchase_line(dec!(25), dec!(87500))]).is_ok());
    }

    #[test]
    fn test_purchase_limits() {
        assert!(validate_purchase_lines(&[purchase_line(dec!(10000), dec!(1000000))]).is_ok());
        assert!(validate_purchase_lines(&[purchase_line(dec!(10000.001), dec!(100))]).is_err());
        assert!(validate_purchase_lines(&[purchase_line(dec!(1), dec!(1000000.01))]).is_err());
    }

    #[test]
    fn test_purchase_unit_price_floor() {
        let err = validate_purchase_lines(&[purchase_line(dec!(1000), dec!(1))]).unwrap_err();
        assert!(err.0[0].contains("unit price"));
    }

    #[test]
    fn test_purchase_non_positive() {
        let err = validate_purchase_lines(&[purchase_line(Decimal::ZERO, Decimal::ZERO)]).unwrap_err();
        assert_eq!(err.0.len(), 2);
        assert_eq!(err.to_string(), err.0.join("; "));
    }

    // ========================================================================
    // Catalog Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_price() {
        assert!(validate_price(dec!(0.01)).is_ok());
        assert!(validate_price(Decimal::ZERO).is_err());
        assert!(validate_cost(Decimal::ZERO).is_ok());
        assert!(validate_cost(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_product_stock_level() {
        assert_eq!(validate_product_stock_level(dec!(12)), Ok(12));
        assert_eq!(validate_product_stock_level(dec!(12.000)), Ok(12));
        assert!(validate_product_stock_level(dec!(12.5)).is_err());
        assert!(validate_product_stock_level(dec!(-1)).is_err());
        assert!(validate_raw_stock_level(dec!(0.125)).is_ok());
    }

    #[test]
    fn test_product_sourcing() {
        let raw = Some(Uuid::new_v4());
        let recipe = Some(Uuid::new_v4());
        assert!(validate_product_sourcing(raw, recipe, Some(dec!(100))).is_err());
        assert!(validate_product_sourcing(raw, None, None).is_err());
        assert!(validate_product_sourcing(raw, None, Some(dec!(250))).is_ok());
        assert!(validate_product_sourcing(None, recipe, None).is_ok());
        assert!(validate_product_sourcing(None, None, Some(Decimal::ZERO)).is_err());
    }

    #[test]
    fn test_recipe_ingredients() {
        let id = Uuid::new_v4();
        assert!(validate_recipe_ingredients(&[(id, dec!(0.5))]).is_ok());
        assert!(validate_recipe_ingredients(&[]).is_err());
        let err = validate_recipe_ingredients(&[(id, dec!(0.5)), (id, Decimal::ZERO)]).unwrap_err();
        assert_eq!(err.0.len(), 2);
    }
}
