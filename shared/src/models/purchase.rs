//! Purchase (inbound raw material) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::round_cost;

/// A purchase header. Cancelled purchases stay with `is_active = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: Uuid,
    pub supplier: String,
    pub purchased_on: NaiveDate,
    pub total: Decimal,
    pub notes: Option<String>,
    pub is_active: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A purchased raw material line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseLine {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub quantity: Decimal,
    pub total_price: Decimal,
    pub unit_price: Decimal,
}

/// Purchase with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseWithLines {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub lines: Vec<PurchaseLine>,
}

/// Requested purchase line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub raw_material_id: Uuid,
    pub quantity: Decimal,
    /// Total paid for the line
    pub total_price: Decimal,
}

impl PurchaseLineInput {
    pub fn unit_price(&self) -> Decimal {
        purchase_unit_price(self.total_price, self.quantity)
    }
}

/// Price per unit from a line total, 0 for an empty quantity
pub fn purchase_unit_price(total_price: Decimal, quantity: Decimal) -> Decimal {
    if quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_cost(total_price / quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unit_price_from_total() {
        assert_eq!(purchase_unit_price(dec!(45000), dec!(5)), dec!(9000));
        assert_eq!(purchase_unit_price(dec!(100), dec!(3)), dec!(33.3333));
        assert_eq!(purchase_unit_price(dec!(100), Decimal::ZERO), Decimal::ZERO);
    }
}
