//! Pricing tests
//!
//! Tests for margins and price suggestions including:
//! - Margin bands
//! - Suggested price reaches the target margin
//! - Rounding suggested prices to tens

use std::str::FromStr;

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    is_in_loss, is_profitable, margin_percent, markup_price, price_increase_percent,
    suggested_price, variation_percent, weighted_average_margin, CostSettings, MarginState,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_margin_bands() {
        assert_eq!(MarginState::classify(dec("-5")), MarginState::Critical);
        assert_eq!(MarginState::classify(dec("9.99")), MarginState::Critical);
        assert_eq!(MarginState::classify(dec("10")), MarginState::Low);
        assert_eq!(MarginState::classify(dec("20")), MarginState::Acceptable);
        assert_eq!(MarginState::classify(dec("30")), MarginState::Optimal);
    }

    #[test]
    fn test_loss_and_profitability() {
        assert!(is_in_loss(dec("4000"), dec("4500")));
        assert!(!is_in_loss(dec("4500"), dec("4500")));
        assert!(is_profitable(dec("5000"), dec("4000")));
        assert!(!is_profitable(dec("5000"), dec("4100")));
    }

    /// A 6500 cost at the default 35% target gives 10000
    #[test]
    fn test_suggested_price_for_default_target() {
        let settings = CostSettings::default();
        let price = suggested_price(dec("6500"), settings.target_margin, false);

        assert_eq!(price, dec("10000"));
        assert!(settings.meets_target(margin_percent(price, dec("6500"))));
    }

    #[test]
    fn test_suggested_price_rounded_to_tens() {
        // 3333 / 0.65 = 5127.69...
        assert_eq!(suggested_price(dec("3333"), dec("35"), false), dec("5127.69"));
        assert_eq!(suggested_price(dec("3333"), dec("35"), true), dec("5130"));
        // 5125 rounds half away from zero
        assert_eq!(suggested_price(dec("3331.25"), dec("35"), true), dec("5130"));
    }

    #[test]
    fn test_unreachable_target_doubles_cost() {
        assert_eq!(suggested_price(dec("1200"), dec("100"), false), dec("2400"));
    }

    #[test]
    fn test_markup_and_increase() {
        let suggested = markup_price(dec("4000"), dec("1.15"));
        assert_eq!(suggested, dec("4600"));
        assert_eq!(price_increase_percent(dec("4000"), suggested), dec("15"));
        assert_eq!(price_increase_percent(Decimal::ZERO, suggested), Decimal::ZERO);
    }

    #[test]
    fn test_variation_percent() {
        assert_eq!(variation_percent(dec("120"), dec("100")), dec("20"));
        assert_eq!(variation_percent(dec("80"), dec("100")), dec("-20"));
        assert_eq!(variation_percent(dec("50"), Decimal::ZERO), dec("100"));
        assert_eq!(variation_percent(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_weighted_margin() {
        let items = vec![(dec("40"), dec("300")), (dec("10"), dec("100"))];
        assert_eq!(weighted_average_margin(&items), dec("32.5"));

        let unsold = vec![(dec("40"), Decimal::ZERO), (dec("20"), Decimal::ZERO)];
        assert_eq!(weighted_average_margin(&unsold), dec("30"));
        assert_eq!(weighted_average_margin(&[]), Decimal::ZERO);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for unit costs in pesos (100.00 to 100000.00)
    fn cost_strategy() -> impl Strategy<Value = Decimal> {
        (10000i64..=10000000i64).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for target margins (0% to 90%)
    fn target_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=90i64).prop_map(Decimal::from)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Pricing at the suggested price yields the target margin
        #[test]
        fn prop_suggested_price_reaches_target(
            cost in cost_strategy(),
            target in target_strategy()
        ) {
            let price = suggested_price(cost, target, false);
            let margin = margin_percent(price, cost);

            prop_assert!((margin - target).abs() <= dec("0.02"));
            prop_assert!(price >= cost);
        }

        /// Rounded prices are multiples of ten within five of the exact price
        #[test]
        fn prop_rounded_price_is_near_exact(
            cost in cost_strategy(),
            target in target_strategy()
        ) {
            let exact = suggested_price(cost, target, false);
            let rounded = suggested_price(cost, target, true);

            prop_assert_eq!(rounded % dec("10"), Decimal::ZERO);
            prop_assert!((rounded - exact).abs() <= dec("5.01"));
        }

        /// A higher price never lowers the margin
        #[test]
        fn prop_margin_monotonic_in_price(
            cost in cost_strategy(),
            price in cost_strategy(),
            raise in 1i64..=100000i64
        ) {
            let higher = price + Decimal::new(raise, 2);
            prop_assert!(margin_percent(higher, cost) >= margin_percent(price, cost));
        }

        /// Loss and margin bands agree: a product in loss has a critical margin
        #[test]
        fn prop_loss_implies_critical(
            cost in cost_strategy(),
            price in cost_strategy()
        ) {
            if is_in_loss(price, cost) {
                prop_assert!(margin_percent(price, cost) < Decimal::ZERO);
                prop_assert_eq!(MarginState::classify(margin_percent(price, cost)), MarginState::Critical);
            }
        }
    }
}
