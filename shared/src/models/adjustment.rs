//! Manual inventory adjustment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason category for a manual stock correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "adjustment_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    PhysicalCount,
    Shrinkage,
    Damage,
    Expiry,
    Correction,
    CustomerReturn,
    Other,
}

impl AdjustmentType {
    pub const ALL: [AdjustmentType; 7] = [
        AdjustmentType::PhysicalCount,
        AdjustmentType::Shrinkage,
        AdjustmentType::Damage,
        AdjustmentType::Expiry,
        AdjustmentType::Correction,
        AdjustmentType::CustomerReturn,
        AdjustmentType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentType::PhysicalCount => "Physical inventory count",
            AdjustmentType::Shrinkage => "Shrinkage",
            AdjustmentType::Damage => "Damaged goods",
            AdjustmentType::Expiry => "Expired goods",
            AdjustmentType::Correction => "Data entry correction",
            AdjustmentType::CustomerReturn => "Customer return",
            AdjustmentType::Other => "Other",
        }
    }
}

/// Which kind of item an adjustment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    RawMaterial,
}

/// A recorded stock correction for exactly one product or raw material
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryAdjustment {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub raw_material_id: Option<Uuid>,
    pub item_name: String,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    /// `new_stock - previous_stock`
    pub difference: Decimal,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl InventoryAdjustment {
    pub fn item_kind(&self) -> ItemKind {
        if self.product_id.is_some() {
            ItemKind::Product
        } else {
            ItemKind::RawMaterial
        }
    }

    pub fn is_increase(&self) -> bool {
        self.difference > Decimal::ZERO
    }

    pub fn is_decrease(&self) -> bool {
        self.difference < Decimal::ZERO
    }

    pub fn type_label(&self) -> &'static str {
        self.adjustment_type.label()
    }
}

pub fn adjustment_difference(previous_stock: Decimal, new_stock: Decimal) -> Decimal {
    new_stock - previous_stock
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn adjustment(previous: Decimal, new: Decimal) -> InventoryAdjustment {
        InventoryAdjustment {
            id: Uuid::new_v4(),
            product_id: Some(Uuid::new_v4()),
            raw_material_id: None,
            item_name: "Almendras 250g".to_string(),
            previous_stock: previous,
            new_stock: new,
            difference: adjustment_difference(previous, new),
            adjustment_type: AdjustmentType::PhysicalCount,
            reason: "Conteo mensual".to_string(),
            user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_direction_helpers() {
        let up = adjustment(dec!(10), dec!(12));
        assert!(up.is_increase());
        assert!(!up.is_decrease());
        assert_eq!(up.difference, dec!(2));

        let down = adjustment(dec!(10), dec!(7));
        assert!(down.is_decrease());
        assert_eq!(down.difference, dec!(-3));

        let same = adjustment(dec!(10), dec!(10));
        assert!(!same.is_increase() && !same.is_decrease());
    }

    #[test]
    fn test_item_kind() {
        let mut adj = adjustment(dec!(1), dec!(2));
        assert_eq!(adj.item_kind(), ItemKind::Product);
        adj.product_id = None;
        adj.raw_material_id = Some(Uuid::new_v4());
        assert_eq!(adj.item_kind(), ItemKind::RawMaterial);
    }

    #[test]
    fn test_every_type_has_a_label() {
        for kind in AdjustmentType::ALL {
            assert!(!kind.label().is_empty());
        }
    }
}
