//! Sales models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::round_money;

/// A sale header. Deleted sales are kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: Uuid,
    pub sold_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub total: Decimal,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub deletion_reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A sold product line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Product unit cost when the sale was made
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
}

/// Sale with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

/// Requested sale line before pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Defaults to the product's list price
    pub unit_price: Option<Decimal>,
}

pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(Decimal::from(quantity) * unit_price)
}

pub fn sale_total(subtotals: impl IntoIterator<Item = Decimal>) -> Decimal {
    round_money(subtotals.into_iter().sum())
}

/// Cost of goods sold for a set of lines
pub fn cost_of_goods_sold(lines: &[SaleLine]) -> Decimal {
    round_money(
        lines
            .iter()
            .map(|line| Decimal::from(line.quantity) * line.unit_cost)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_subtotal() {
        assert_eq!(line_subtotal(3, dec!(1250.50)), dec!(3751.50));
        assert_eq!(line_subtotal(0, dec!(10)), Decimal::ZERO);
    }

    #[test]
    fn test_sale_total_sums_subtotals() {
        let subtotals = vec![line_subtotal(2, dec!(100)), line_subtotal(1, dec!(45.5))];
        assert_eq!(sale_total(subtotals), dec!(245.5));
    }

    #[test]
    fn test_cost_of_goods_sold() {
        let sale_id = Uuid::new_v4();
        let line = |quantity: i32, unit_cost: Decimal| SaleLine {
            id: Uuid::new_v4(),
            sale_id,
            product_id: Uuid::new_v4(),
            product_name: "Mix".to_string(),
            quantity,
            unit_price: dec!(100),
            unit_cost,
            subtotal: line_subtotal(quantity, dec!(100)),
        };
        let lines = vec![line(2, dec!(40)), line(3, dec!(10.333))];
        assert_eq!(cost_of_goods_sold(&lines), dec!(111));
    }
}
