//! Sales tests
//!
//! Tests for sale recording including:
//! - Line validation against product stock
//! - Units aggregated per product before locking
//! - Selling N units reduces stock by exactly N
//! - Stock never goes negative once a sale validates
//! - Deleting a sale puts its units back

use std::collections::HashMap;
use std::str::FromStr;

use lino_backoffice::services::sales::{stock_after, units_per_product, StockMovement};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    line_subtotal, sale_total, validate_sale_lines, ProductStockView, SaleLineInput,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(product_id: Uuid, quantity: i32) -> SaleLineInput {
    SaleLineInput {
        product_id,
        quantity,
        unit_price: None,
    }
}

fn catalog(entries: &[(Uuid, &str, i32, bool)]) -> HashMap<Uuid, ProductStockView> {
    entries
        .iter()
        .map(|(id, name, stock, is_active)| {
            (
                *id,
                ProductStockView {
                    name: name.to_string(),
                    stock: *stock,
                    is_active: *is_active,
                },
            )
        })
        .collect()
}

fn units(lines: &[SaleLineInput]) -> Vec<(Uuid, i32)> {
    lines.iter().map(|l| (l.product_id, l.quantity)).collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_valid_sale_passes() {
        let granola = Uuid::new_v4();
        let products = catalog(&[(granola, "Granola sin azúcar", 12, true)]);

        let result = validate_sale_lines(&[line(granola, 3)], |id| products.get(&id).cloned());
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_sale_rejected() {
        let result = validate_sale_lines(&[], |_| None);
        let errors = result.unwrap_err();
        assert_eq!(errors.0.len(), 1);
        assert!(errors.0[0].contains("at least one line"));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let missing = Uuid::new_v4();
        let errors = validate_sale_lines(&[line(missing, 1)], |_| None).unwrap_err();
        assert!(errors.0[0].contains("does not exist"));
    }

    #[test]
    fn test_inactive_product_rejected() {
        let id = Uuid::new_v4();
        let products = catalog(&[(id, "Pan de centeno", 10, false)]);

        let errors = validate_sale_lines(&[line(id, 1)], |id| products.get(&id).cloned()).unwrap_err();
        assert!(errors.0.iter().any(|e| e.contains("no longer sold")));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let id = Uuid::new_v4();
        let products = catalog(&[(id, "Chía", 10, true)]);

        let errors = validate_sale_lines(&[line(id, 0)], |id| products.get(&id).cloned()).unwrap_err();
        assert!(errors.0[0].contains("must be positive"));
    }

    #[test]
    fn test_negative_price_rejected() {
        let id = Uuid::new_v4();
        let products = catalog(&[(id, "Chía", 10, true)]);
        let lines = vec![SaleLineInput {
            product_id: id,
            quantity: 1,
            unit_price: Some(dec("-1")),
        }];

        let errors = validate_sale_lines(&lines, |id| products.get(&id).cloned()).unwrap_err();
        assert!(errors.0[0].contains("cannot be negative"));
    }

    /// Two lines of the same product are checked against stock together
    #[test]
    fn test_repeated_product_lines_are_summed() {
        let id = Uuid::new_v4();
        let products = catalog(&[(id, "Quinoa", 5, true)]);
        let lines = vec![line(id, 3), line(id, 3)];

        let errors = validate_sale_lines(&lines, |id| products.get(&id).cloned()).unwrap_err();
        assert_eq!(errors.0.len(), 1);
        assert!(errors.0[0].contains("5 available, 6 requested"));
    }

    #[test]
    fn test_all_errors_reported() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let products = catalog(&[(a, "Avena", 1, true), (b, "Linaza", 0, false)]);
        let lines = vec![line(a, 2), line(b, 1)];

        let errors = validate_sale_lines(&lines, |id| products.get(&id).cloned()).unwrap_err();
        // inactive b, then stock for a and b
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn test_units_per_product_groups_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals = units_per_product(vec![(a, 2), (b, 1), (a, 4)]);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], 6);
        assert_eq!(totals[&b], 1);
    }

    /// Products are locked in id order to avoid deadlocks between sales
    #[test]
    fn test_units_per_product_sorted_by_id() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let totals = units_per_product(ids.iter().map(|id| (*id, 1)));

        let keys: Vec<Uuid> = totals.keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_line_subtotal_and_total() {
        let first = line_subtotal(3, dec("4990"));
        let second = line_subtotal(2, dec("2500.50"));

        assert_eq!(first, dec("14970"));
        assert_eq!(second, dec("5001"));
        assert_eq!(sale_total(vec![first, second]), dec("19971"));
    }

    #[test]
    fn test_selling_reduces_stock() {
        let id = Uuid::new_v4();
        let stock = HashMap::from([(id, 10)]);

        let levels = stock_after(&stock, units(&[line(id, 4)]), StockMovement::Sale);
        assert_eq!(levels[&id], 6);
    }

    #[test]
    fn test_repeated_lines_move_stock_once_per_product() {
        let id = Uuid::new_v4();
        let stock = HashMap::from([(id, 10)]);

        let levels = stock_after(&stock, units(&[line(id, 2), line(id, 3)]), StockMovement::Sale);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[&id], 5);
    }

    #[test]
    fn test_deleting_sale_restores_units() {
        let avena = Uuid::new_v4();
        let chia = Uuid::new_v4();
        let after_sale = HashMap::from([(avena, 3), (chia, 0)]);
        let sold = vec![(avena, 2), (chia, 4), (avena, 1)];

        let restored = stock_after(&after_sale, sold, StockMovement::Reversal);
        assert_eq!(restored[&avena], 6);
        assert_eq!(restored[&chia], 4);
    }

    #[test]
    fn test_reversal_skips_products_no_longer_present() {
        let kept = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let stock = HashMap::from([(kept, 1)]);

        let restored = stock_after(&stock, vec![(kept, 1), (removed, 5)], StockMovement::Reversal);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[&kept], 2);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Selling N units of a product reduces its stock by exactly N
        #[test]
        fn prop_sale_reduces_stock_by_quantity(
            stock in 1i32..=500,
            quantity in 1i32..=500
        ) {
            let id = Uuid::new_v4();
            let products = catalog(&[(id, "Producto", stock, true)]);
            let lines = vec![line(id, quantity)];

            let result = validate_sale_lines(&lines, |id| products.get(&id).cloned());
            if quantity <= stock {
                prop_assert!(result.is_ok());
                let levels = stock_after(&HashMap::from([(id, stock)]), units(&lines), StockMovement::Sale);
                prop_assert_eq!(levels[&id], stock - quantity);
            } else {
                prop_assert!(result.is_err());
            }
        }

        /// A sale that validates never leaves any product with negative stock
        #[test]
        fn prop_validated_sale_never_negative(
            stocks in prop::collection::vec(0i32..=50, 1..5),
            picks in prop::collection::vec((0usize..5, 1i32..=20), 1..8)
        ) {
            let ids: Vec<Uuid> = stocks.iter().map(|_| Uuid::new_v4()).collect();
            let entries: Vec<(Uuid, &str, i32, bool)> = ids
                .iter()
                .zip(&stocks)
                .map(|(id, stock)| (*id, "Producto", *stock, true))
                .collect();
            let products = catalog(&entries);
            let lines: Vec<SaleLineInput> = picks
                .iter()
                .map(|(index, quantity)| line(ids[index % ids.len()], *quantity))
                .collect();

            if validate_sale_lines(&lines, |id| products.get(&id).cloned()).is_ok() {
                let current: HashMap<Uuid, i32> = ids.iter().copied().zip(stocks.iter().copied()).collect();
                let levels = stock_after(&current, units(&lines), StockMovement::Sale);
                prop_assert!(levels.values().all(|stock| *stock >= 0));
            }
        }

        /// Deleting a sale returns every product to its stock before the sale
        #[test]
        fn prop_delete_undoes_sale(
            stocks in prop::collection::vec(0i32..=50, 1..5),
            picks in prop::collection::vec((0usize..5, 1i32..=20), 1..8)
        ) {
            let ids: Vec<Uuid> = stocks.iter().map(|_| Uuid::new_v4()).collect();
            let before: HashMap<Uuid, i32> = ids.iter().copied().zip(stocks.iter().copied()).collect();
            let sold: Vec<(Uuid, i32)> = picks
                .iter()
                .map(|(index, quantity)| (ids[index % ids.len()], *quantity))
                .collect();

            let after_sale: HashMap<Uuid, i32> =
                stock_after(&before, sold.clone(), StockMovement::Sale).into_iter().collect();
            let mut after_delete = before.clone();
            after_delete.extend(stock_after(&after_sale, sold, StockMovement::Reversal));
            prop_assert_eq!(after_delete, before);
        }

        /// Total units per product equal the sum of the requested lines
        #[test]
        fn prop_units_per_product_preserves_total(
            quantities in prop::collection::vec(1i32..=100, 1..20)
        ) {
            let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let lines: Vec<(Uuid, i32)> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| (ids[i % ids.len()], *q))
                .collect();

            let totals = units_per_product(lines.clone());
            let expected: i32 = quantities.iter().sum();
            prop_assert_eq!(totals.values().sum::<i32>(), expected);
        }

        /// The sale total is the sum of its line subtotals
        #[test]
        fn prop_sale_total_is_sum_of_lines(
            lines in prop::collection::vec((1i32..=50, 1i64..=100000), 1..10)
        ) {
            let subtotals: Vec<Decimal> = lines
                .iter()
                .map(|(q, cents)| line_subtotal(*q, Decimal::new(*cents, 2)))
                .collect();
            let expected: Decimal = subtotals.iter().sum();
            prop_assert_eq!(sale_total(subtotals), expected);
        }
    }
}
