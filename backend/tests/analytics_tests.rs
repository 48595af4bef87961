//! Analytics tests
//!
//! Tests for the reporting calculations including:
//! - Financial health index bounds
//! - Break-even covering the fixed costs
//! - Rotation and inventory days
//! - Rankings used by the dashboard, inventory and marketing views

use std::str::FromStr;

use lino_backoffice::services::{
    analytics::{price_recommendation, scan_profitability, Urgency},
    dashboard::rank_top_products,
    inventory::slow_movers,
    marketing::{rank_heroes, related_products, CoSale},
    sales_stats::ProductSales,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    break_even, financial_health, inventory_days, projected_cash_flow, rotation, HealthClass,
    InventoryDaysClass, ProductActivity,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn product_sales(name: &str, price: &str, cost: &str, stock: i32, units: i64) -> ProductSales {
    let price = dec(price);
    ProductSales {
        product_id: Uuid::new_v4(),
        name: name.to_string(),
        category: None,
        price,
        unit_cost: dec(cost),
        stock,
        minimum_stock: 5,
        units_sold: units,
        revenue: price * Decimal::from(units),
        cogs: dec(cost) * Decimal::from(units),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_healthy_business_scores_excellent() {
        let score = financial_health(dec("250000"), dec("45"), InventoryDaysClass::Excellent, dec("95"));
        assert_eq!(score.overall, dec("100"));
        assert_eq!(score.class, HealthClass::Excellent);
    }

    #[test]
    fn test_struggling_business_scores_poor() {
        let score = financial_health(dec("-1000"), dec("2"), InventoryDaysClass::Poor, dec("40"));
        assert_eq!(score.overall, dec("30"));
        assert_eq!(score.class, HealthClass::Poor);
    }

    #[test]
    fn test_loss_product_gets_urgent_recommendation() {
        let product = product_sales("Harina de coco", "4000", "4200", 10, 5);
        let recommendation = price_recommendation(&product).unwrap();

        assert_eq!(recommendation.urgency, Urgency::Urgent);
        // 4200 × 1.15
        assert_eq!(recommendation.suggested_price, dec("4830"));
    }

    #[test]
    fn test_healthy_product_gets_no_recommendation() {
        let product = product_sales("Almendras", "10000", "6000", 10, 5);
        assert!(price_recommendation(&product).is_none());
    }

    #[test]
    fn test_scan_counts_every_bucket() {
        let month = vec![
            product_sales("En pérdida", "1000", "1100", 3, 2),
            product_sales("Margen crítico", "1000", "950", 3, 0),
            product_sales("Sano", "1000", "500", 3, 9),
        ];
        let alerts = scan_profitability(&month);

        assert_eq!(alerts.in_loss.len(), 1);
        assert_eq!(alerts.critical_margin.len(), 1);
        assert_eq!(alerts.without_sales.len(), 1);
        assert_eq!(alerts.total(), 3);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn money_strategy() -> impl Strategy<Value = Decimal> {
        (-10000000i64..=10000000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn days_class_strategy() -> impl Strategy<Value = InventoryDaysClass> {
        prop_oneof![
            Just(InventoryDaysClass::Excellent),
            Just(InventoryDaysClass::Good),
            Just(InventoryDaysClass::Fair),
            Just(InventoryDaysClass::Poor),
        ]
    }

    fn sales_strategy() -> impl Strategy<Value = ProductSales> {
        (1i64..=50000, 1i64..=50000, 0i32..=100, 0i64..=200).prop_map(
            |(price, cost, stock, units)| {
                product_sales("Producto", &price.to_string(), &cost.to_string(), stock, units)
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The health index stays within the sub-score range and matches its class
        #[test]
        fn prop_health_index_bounded(
            cash in money_strategy(),
            roi in -100i64..=200,
            days_class in days_class_strategy(),
            healthy in 0i64..=100
        ) {
            let score = financial_health(cash, Decimal::from(roi), days_class, Decimal::from(healthy));
            prop_assert!(score.overall >= dec("30") && score.overall <= dec("100"));
            prop_assert_eq!(score.class, HealthClass::classify(score.overall));
        }

        /// Selling the break-even units covers the fixed costs
        #[test]
        fn prop_break_even_covers_fixed_costs(
            sales in 0i64..=100000000,
            price in 100i64..=100000,
            cost in 1i64..=100000
        ) {
            let price = Decimal::from(price);
            let cost = Decimal::from(cost);
            let result = break_even(Decimal::from(sales), dec("0.15"), price, cost);

            if price > cost {
                let covered = result.units * result.unit_contribution;
                prop_assert!((covered - result.fixed_costs).abs() <= result.unit_contribution * dec("0.01"));
            } else {
                prop_assert_eq!(result.units, Decimal::ZERO);
            }
        }

        /// Projected cash flow scales with the number of days
        #[test]
        fn prop_cash_flow_sign_follows_net(
            sales in 0i64..=10000000,
            purchases in 0i64..=10000000,
            days in 1i64..=365
        ) {
            let projected = projected_cash_flow(Decimal::from(sales), Decimal::from(purchases), days);
            prop_assert_eq!(projected > Decimal::ZERO, sales > purchases);
        }

        /// Higher rotation means fewer inventory days
        #[test]
        fn prop_inventory_days_decrease_with_rotation(
            cogs in 1000i64..=10000000,
            value in 1i64..=1000,
            extra in 1i64..=10000000
        ) {
            let slow = rotation(Decimal::from(cogs), Decimal::from(value));
            let fast = rotation(Decimal::from(cogs + extra), Decimal::from(value));
            prop_assert!(inventory_days(fast) <= inventory_days(slow));
        }

        /// Slow movers respect the minimum and are ordered by tied value
        #[test]
        fn prop_slow_movers_sorted_and_filtered(
            items in prop::collection::vec((0i32..=50, 1i64..=10000, prop::option::of(0i64..=200)), 0..20),
            min_days in 1i64..=120
        ) {
            let activities: Vec<ProductActivity> = items
                .iter()
                .map(|(stock, cost, days)| ProductActivity {
                    product_id: Uuid::new_v4(),
                    name: "Producto".to_string(),
                    price: Decimal::from(cost * 2),
                    unit_cost: Decimal::from(*cost),
                    stock: *stock,
                    minimum_stock: 5,
                    units_sold_30d: 0,
                    days_since_last_sale: *days,
                })
                .collect();

            let movers = slow_movers(&activities, min_days);
            prop_assert!(movers.iter().all(|m| m.days_without_sale >= min_days && m.stock > 0));
            prop_assert!(movers.windows(2).all(|w| w[0].tied_value >= w[1].tied_value));
        }

        /// Hero ranks start at one and profit never increases down the list
        #[test]
        fn prop_heroes_ranked_by_profit(
            month in prop::collection::vec(sales_strategy(), 0..15),
            limit in 1usize..=10
        ) {
            let heroes = rank_heroes(&month, limit);
            prop_assert!(heroes.len() <= limit);
            for (i, hero) in heroes.iter().enumerate() {
                prop_assert_eq!(hero.rank, i + 1);
            }
            prop_assert!(heroes.windows(2).all(|w| w[0].total_profit >= w[1].total_profit));
        }

        /// Top products only include products that sold, best revenue first
        #[test]
        fn prop_top_products_by_revenue(
            month in prop::collection::vec(sales_strategy(), 0..15),
            limit in 1usize..=10
        ) {
            let top = rank_top_products(&month, limit);
            prop_assert!(top.len() <= limit);
            prop_assert!(top.iter().all(|p| p.units_sold > 0));
            prop_assert!(top.windows(2).all(|w| w[0].revenue >= w[1].revenue));
        }

        /// Related products always share at least 30% of the base sales
        #[test]
        fn prop_related_products_share_threshold(
            base in 1i64..=500,
            shared_counts in prop::collection::vec(0i64..=500, 0..10)
        ) {
            let co_sales: Vec<CoSale> = shared_counts
                .iter()
                .map(|n| CoSale {
                    product_id: Uuid::new_v4(),
                    name: "Producto".to_string(),
                    shared_sales: (*n).min(base),
                })
                .collect();

            let related = related_products(base, &co_sales, 10);
            prop_assert!(related.iter().all(|r| r.share_percent >= dec("30")));
            prop_assert!(related.iter().all(|r| r.strong == (r.share_percent >= dec("70"))));
        }
    }
}
