//! Raw material models and weighted-average costing

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{round_cost, round_quantity};

/// A bulk material bought from suppliers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RawMaterial {
    pub id: Uuid,
    pub name: String,
    pub supplier: Option<String>,
    pub unit: String,
    /// Weighted-average cost per unit
    pub unit_cost: Decimal,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a raw material stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "movement_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entry,
    Exit,
    Adjustment,
}

/// Audit record of a raw material stock change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RawMaterialMovement {
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub cost_before: Decimal,
    pub cost_after: Decimal,
    pub reason: Option<String>,
    /// What caused the movement: `purchase`, `purchase_cancel`, `production`, `adjustment`
    pub reference_kind: Option<String>,
    pub reference_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Stock quantity and unit cost of a raw material at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValuation {
    pub stock: Decimal,
    pub unit_cost: Decimal,
}

impl StockValuation {
    pub fn new(stock: Decimal, unit_cost: Decimal) -> Self {
        Self { stock, unit_cost }
    }

    pub fn value(&self) -> Decimal {
        self.stock * self.unit_cost
    }

    /// Receive `quantity` units bought at `unit_price`.
    ///
    /// The new cost is the weighted average `(S·C + q·p) / (S + q)`.
    pub fn receive(&self, quantity: Decimal, unit_price: Decimal) -> Self {
        let stock = self.stock + quantity;
        let unit_cost = if stock > Decimal::ZERO {
            round_cost((self.value() + quantity * unit_price) / stock)
        } else {
            round_cost(unit_price)
        };
        Self {
            stock: round_quantity(stock),
            unit_cost,
        }
    }

    /// Undo a receipt of `quantity` units bought at `unit_price`.
    ///
    /// Stock is clamped at zero. When nothing remains the cost resets to zero,
    /// otherwise the weighted average is unwound and clamped at zero.
    pub fn reverse_receipt(&self, quantity: Decimal, unit_price: Decimal) -> Self {
        let remaining = self.stock - quantity;
        if remaining <= Decimal::ZERO {
            return Self {
                stock: Decimal::ZERO,
                unit_cost: Decimal::ZERO,
            };
        }

        let unit_cost = round_cost((self.value() - quantity * unit_price) / remaining);
        Self {
            stock: round_quantity(remaining),
            unit_cost: unit_cost.max(Decimal::ZERO),
        }
    }

    /// Take `quantity` units out at the current cost
    pub fn consume(&self, quantity: Decimal) -> Option<Self> {
        if quantity > self.stock {
            return None;
        }
        Some(Self {
            stock: round_quantity(self.stock - quantity),
            unit_cost: self.unit_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_receive_weighted_average() {
        let before = StockValuation::new(dec!(10), dec!(5));
        let after = before.receive(dec!(10), dec!(7));
        assert_eq!(after.stock, dec!(20));
        assert_eq!(after.unit_cost, dec!(6));
    }

    #[test]
    fn test_receive_into_empty_stock_takes_purchase_price() {
        let after = StockValuation::new(Decimal::ZERO, Decimal::ZERO).receive(dec!(3), dec!(8.5));
        assert_eq!(after.stock, dec!(3));
        assert_eq!(after.unit_cost, dec!(8.5));
    }

    #[test]
    fn test_reverse_restores_previous_cost() {
        let before = StockValuation::new(dec!(10), dec!(5));
        let after = before.receive(dec!(10), dec!(7));
        assert_eq!(after.reverse_receipt(dec!(10), dec!(7)), before);
    }

    #[test]
    fn test_reverse_clamps_at_zero() {
        let partly_sold = StockValuation::new(dec!(4), dec!(6));
        let reversed = partly_sold.reverse_receipt(dec!(10), dec!(7));
        assert_eq!(reversed.stock, Decimal::ZERO);
        assert_eq!(reversed.unit_cost, Decimal::ZERO);
    }

    #[test]
    fn test_reverse_never_negative_cost() {
        // Remaining units were valued below what the reversed purchase cost
        let state = StockValuation::new(dec!(12), dec!(1));
        let reversed = state.reverse_receipt(dec!(10), dec!(5));
        assert_eq!(reversed.stock, dec!(2));
        assert_eq!(reversed.unit_cost, Decimal::ZERO);
    }

    #[test]
    fn test_consume() {
        let state = StockValuation::new(dec!(2.5), dec!(4));
        assert_eq!(state.consume(dec!(0.5)).unwrap().stock, dec!(2));
        assert!(state.consume(dec!(2.501)).is_none());
    }
}
