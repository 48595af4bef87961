//! Purchase tests
//!
//! Tests for raw material purchasing including:
//! - Line validation limits
//! - Weighted-average unit cost on receipt
//! - Cancelling a purchase restores stock and cost
//! - Receipts of the same raw material unwind newest first

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lino_backoffice::services::purchases::{pair_receipts, plan_reversal, reversal_valuation};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    purchase_unit_price, validate_purchase_lines, MovementKind, PurchaseLine, PurchaseLineInput,
    RawMaterialMovement, StockValuation, MAX_PURCHASE_QUANTITY,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn purchase_line(quantity: &str, total_price: &str) -> PurchaseLineInput {
    PurchaseLineInput {
        raw_material_id: Uuid::new_v4(),
        quantity: dec(quantity),
        total_price: dec(total_price),
    }
}

/// Entry movement recorded when `before` received `quantity` at `unit_price`
fn entry_movement(before: StockValuation, quantity: Decimal, unit_price: Decimal) -> RawMaterialMovement {
    let after = before.receive(quantity, unit_price);
    RawMaterialMovement {
        id: Uuid::new_v4(),
        raw_material_id: Uuid::new_v4(),
        kind: MovementKind::Entry,
        quantity,
        stock_before: before.stock,
        stock_after: after.stock,
        cost_before: before.unit_cost,
        cost_after: after.unit_cost,
        reason: None,
        reference_kind: Some("purchase".to_string()),
        reference_id: Some(Uuid::new_v4()),
        user_id: None,
        created_at: Utc::now(),
    }
}

/// Entry for `raw_material_id` stamped at `at`, as a purchase records it
fn receipt_entry(
    raw_material_id: Uuid,
    before: StockValuation,
    quantity: Decimal,
    unit_price: Decimal,
    at: DateTime<Utc>,
) -> RawMaterialMovement {
    let mut entry = entry_movement(before, quantity, unit_price);
    entry.raw_material_id = raw_material_id;
    entry.created_at = at;
    entry
}

fn receipt_line(raw_material_id: Uuid, quantity: Decimal, unit_price: Decimal) -> PurchaseLine {
    PurchaseLine {
        id: Uuid::new_v4(),
        purchase_id: Uuid::new_v4(),
        raw_material_id,
        raw_material_name: "Harina integral".to_string(),
        quantity,
        total_price: quantity * unit_price,
        unit_price,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_valid_purchase_lines() {
        let lines = vec![purchase_line("25", "187500"), purchase_line("2.5", "30000")];
        assert!(validate_purchase_lines(&lines).is_ok());
    }

    #[test]
    fn test_empty_purchase_rejected() {
        let errors = validate_purchase_lines(&[]).unwrap_err();
        assert!(errors.0[0].contains("at least one line"));
    }

    #[test]
    fn test_quantity_limits() {
        let errors = validate_purchase_lines(&[purchase_line("0", "1000")]).unwrap_err();
        assert!(errors.0[0].contains("quantity must be positive"));

        let too_much = (MAX_PURCHASE_QUANTITY + Decimal::ONE).to_string();
        let errors = validate_purchase_lines(&[purchase_line(&too_much, "1000")]).unwrap_err();
        assert!(errors.0[0].contains("quantity exceeds"));
    }

    #[test]
    fn test_total_limits() {
        let errors = validate_purchase_lines(&[purchase_line("10", "0")]).unwrap_err();
        assert!(errors.0[0].contains("total must be positive"));

        let errors = validate_purchase_lines(&[purchase_line("10", "1000001")]).unwrap_err();
        assert!(errors.0[0].contains("total exceeds"));
    }

    #[test]
    fn test_unit_price_floor() {
        let errors = validate_purchase_lines(&[purchase_line("1000", "1")]).unwrap_err();
        assert!(errors.0[0].contains("unit price must be at least"));
    }

    #[test]
    fn test_purchase_unit_price() {
        assert_eq!(purchase_unit_price(dec("187500"), dec("25")), dec("7500"));
        assert_eq!(purchase_unit_price(dec("100"), dec("3")), dec("33.3333"));
        assert_eq!(purchase_unit_price(dec("100"), Decimal::ZERO), Decimal::ZERO);
    }

    /// 10 kg at 8000 plus 30 kg at 9000 averages to 8750
    #[test]
    fn test_weighted_average_on_receipt() {
        let current = StockValuation::new(dec("10"), dec("8000"));
        let after = current.receive(dec("30"), dec("9000"));

        assert_eq!(after.stock, dec("40"));
        assert_eq!(after.unit_cost, dec("8750"));
    }

    #[test]
    fn test_first_receipt_takes_purchase_price() {
        let empty = StockValuation::new(Decimal::ZERO, Decimal::ZERO);
        let after = empty.receive(dec("12.5"), dec("4200"));

        assert_eq!(after.stock, dec("12.5"));
        assert_eq!(after.unit_cost, dec("4200"));
    }

    #[test]
    fn test_reversal_restores_recorded_state() {
        let before = StockValuation::new(dec("10"), dec("8000"));
        let entry = entry_movement(before, dec("30"), dec("9000"));
        let current = before.receive(dec("30"), dec("9000"));

        let restored = reversal_valuation(current, Some(&entry), false, dec("30"), dec("9000"));
        assert_eq!(restored, before);
    }

    /// After later movements the receipt is unwound from the current state
    #[test]
    fn test_reversal_after_later_movements() {
        let before = StockValuation::new(dec("10"), dec("8000"));
        let entry = entry_movement(before, dec("30"), dec("9000"));
        let current = StockValuation::new(dec("35"), dec("8750"));

        let restored = reversal_valuation(current, Some(&entry), true, dec("30"), dec("9000"));
        assert_eq!(restored.stock, dec("5"));
        assert_eq!(restored.unit_cost, dec("7250"));
    }

    #[test]
    fn test_reversal_clamps_at_zero() {
        let current = StockValuation::new(dec("20"), dec("9000"));
        let restored = reversal_valuation(current, None, false, dec("30"), dec("9000"));

        assert_eq!(restored.stock, Decimal::ZERO);
        assert_eq!(restored.unit_cost, Decimal::ZERO);
    }

    /// Two lines of one raw material in the same purchase
    #[test]
    fn test_cancel_two_lines_same_material_restores_pre_purchase_state() {
        let flour = Uuid::new_v4();
        let at = Utc::now();
        let before = StockValuation::new(dec("10"), dec("8000"));
        let middle = before.receive(dec("30"), dec("9000"));
        let after = middle.receive(dec("20"), dec("7000"));

        let lines = vec![
            receipt_line(flour, dec("30"), dec("9000")),
            receipt_line(flour, dec("20"), dec("7000")),
        ];
        let entries = vec![
            receipt_entry(flour, before, dec("30"), dec("9000"), at),
            receipt_entry(flour, middle, dec("20"), dec("7000"), at),
        ];

        let steps = pair_receipts(&lines, &entries);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].0.quantity, dec("20"));
        assert_eq!(steps[0].1.map(|e| e.stock_before), Some(middle.stock));

        let reversals = plan_reversal(HashMap::from([(flour, after)]), &steps, &HashSet::new());
        assert_eq!(reversals.len(), 2);
        assert_eq!(reversals[0].before, after);
        assert_eq!(reversals[0].after, middle);
        assert_eq!(reversals[1].before, middle);
        assert_eq!(reversals[1].after, before);
        assert!(reversals.iter().all(|r| r.exact));
    }

    #[test]
    fn test_unpaired_line_is_unwound_arithmetically() {
        let oats = Uuid::new_v4();
        let current = StockValuation::new(dec("35"), dec("8750"));
        let lines = vec![receipt_line(oats, dec("30"), dec("9000"))];

        let steps = pair_receipts(&lines, &[]);
        assert!(steps[0].1.is_none());

        let reversals = plan_reversal(HashMap::from([(oats, current)]), &steps, &HashSet::new());
        assert!(!reversals[0].exact);
        assert_eq!(reversals[0].after.stock, dec("5"));
        assert_eq!(reversals[0].after.unit_cost, dec("7250"));
    }

    #[test]
    fn test_superseded_entry_is_unwound_from_current_state() {
        let oats = Uuid::new_v4();
        let before = StockValuation::new(dec("10"), dec("8000"));
        let current = StockValuation::new(dec("35"), dec("8750"));
        let lines = vec![receipt_line(oats, dec("30"), dec("9000"))];
        let entries = vec![receipt_entry(oats, before, dec("30"), dec("9000"), Utc::now())];

        let steps = pair_receipts(&lines, &entries);
        let superseded = HashSet::from([entries[0].id]);
        let reversals = plan_reversal(HashMap::from([(oats, current)]), &steps, &superseded);

        assert!(!reversals[0].exact);
        assert_eq!(reversals[0].after.stock, dec("5"));
    }

    #[test]
    fn test_entries_match_their_own_raw_material() {
        let oats = Uuid::new_v4();
        let chia = Uuid::new_v4();
        let empty = StockValuation::new(Decimal::ZERO, Decimal::ZERO);
        let lines = vec![
            receipt_line(oats, dec("5"), dec("1000")),
            receipt_line(chia, dec("5"), dec("3000")),
        ];
        let entries = vec![receipt_entry(chia, empty, dec("5"), dec("3000"), Utc::now())];

        let steps = pair_receipts(&lines, &entries);
        assert_eq!(steps[0].0.raw_material_id, chia);
        assert!(steps[0].1.is_some());
        assert_eq!(steps[1].0.raw_material_id, oats);
        assert!(steps[1].1.is_none());
    }

    #[test]
    fn test_consume_keeps_cost() {
        let current = StockValuation::new(dec("10"), dec("8000"));
        let after = current.consume(dec("2.5")).unwrap();

        assert_eq!(after.stock, dec("7.5"));
        assert_eq!(after.unit_cost, dec("8000"));
        assert!(current.consume(dec("10.001")).is_none());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for bulk stock levels (0.1 to 1000.0)
    fn stock_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1))
    }

    /// Strategy for unit costs (1.00 to 50000.00)
    fn cost_strategy() -> impl Strategy<Value = Decimal> {
        (100i64..=5000000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A purchase followed by its cancellation restores stock and cost exactly
        #[test]
        fn prop_purchase_then_cancel_restores_state(
            stock in stock_strategy(),
            cost in cost_strategy(),
            quantity in stock_strategy(),
            price in cost_strategy()
        ) {
            let before = StockValuation::new(stock, cost);
            let entry = entry_movement(before, quantity, price);
            let after = before.receive(quantity, price);

            let restored = reversal_valuation(after, Some(&entry), false, quantity, price);
            prop_assert_eq!(restored, before);
        }

        /// Cancelling a purchase with two lines of the same raw material
        /// returns it to its stock and cost before the purchase
        #[test]
        fn prop_cancel_repeated_material_restores_state(
            stock in stock_strategy(),
            cost in cost_strategy(),
            first in stock_strategy(),
            first_price in cost_strategy(),
            second in stock_strategy(),
            second_price in cost_strategy()
        ) {
            let id = Uuid::new_v4();
            let at = Utc::now();
            let before = StockValuation::new(stock, cost);
            let middle = before.receive(first, first_price);
            let after = middle.receive(second, second_price);

            let lines = vec![
                receipt_line(id, first, first_price),
                receipt_line(id, second, second_price),
            ];
            let entries = vec![
                receipt_entry(id, before, first, first_price, at),
                receipt_entry(id, middle, second, second_price, at),
            ];

            let steps = pair_receipts(&lines, &entries);
            let reversals = plan_reversal(HashMap::from([(id, after)]), &steps, &HashSet::new());
            prop_assert_eq!(reversals.len(), 2);
            prop_assert_eq!(reversals[1].after, before);
        }

        /// Unwinding arithmetically restores stock exactly and cost up to rounding
        #[test]
        fn prop_arithmetic_reversal_close_to_original(
            stock in stock_strategy(),
            cost in cost_strategy(),
            quantity in stock_strategy(),
            price in cost_strategy()
        ) {
            let before = StockValuation::new(stock, cost);
            let after = before.receive(quantity, price);
            let restored = after.reverse_receipt(quantity, price);

            prop_assert_eq!(restored.stock, stock);
            // cost is stored to four places, the error scales with (S + q) / S
            let tolerance = dec("0.0001") * (stock + quantity) / stock + dec("0.0001");
            prop_assert!((restored.unit_cost - cost).abs() <= tolerance);
        }

        /// The averaged cost lies between the previous cost and the purchase price
        #[test]
        fn prop_average_between_old_and_new(
            stock in stock_strategy(),
            cost in cost_strategy(),
            quantity in stock_strategy(),
            price in cost_strategy()
        ) {
            let after = StockValuation::new(stock, cost).receive(quantity, price);
            let low = cost.min(price) - dec("0.0001");
            let high = cost.max(price) + dec("0.0001");

            prop_assert!(after.unit_cost >= low && after.unit_cost <= high);
            prop_assert_eq!(after.stock, stock + quantity);
        }

        /// Consumption never drives stock negative
        #[test]
        fn prop_consume_never_negative(
            stock in stock_strategy(),
            quantity in stock_strategy()
        ) {
            let current = StockValuation::new(stock, dec("1000"));
            match current.consume(quantity) {
                Some(after) => prop_assert!(after.stock >= Decimal::ZERO),
                None => prop_assert!(quantity > stock),
            }
        }
    }
}
