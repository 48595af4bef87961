//! Margin and price calculations

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

/// Margin at or above which a product counts as profitable
pub const PROFITABLE_MARGIN: Decimal = dec!(20);

/// Margin below which the low-margin analysis flags a product
pub const LOW_MARGIN_ANALYSIS_THRESHOLD: Decimal = dec!(25);

/// Margin below which a product enters the critical products list
pub const CRITICAL_LIST_MARGIN: Decimal = dec!(30);

/// Monthly units at which a product is a top seller
pub const TOP_SELLER_UNITS: i64 = 10;

/// Cost share of price above which supplier renegotiation is advised
pub const SUPPLIER_COST_SHARE: Decimal = dec!(0.6);

const ONE_HUNDRED: Decimal = dec!(100);

/// Gross margin as a percentage of price, rounded to two places.
///
/// A product without a positive price has no meaningful margin and reports 0.
pub fn margin_percent(price: Decimal, cost: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money((price - cost) / price * ONE_HUNDRED)
}

/// Unit profit, price minus cost
pub fn unit_profit(price: Decimal, cost: Decimal) -> Decimal {
    price - cost
}

pub fn is_profitable(price: Decimal, cost: Decimal) -> bool {
    margin_percent(price, cost) >= PROFITABLE_MARGIN
}

pub fn is_in_loss(price: Decimal, cost: Decimal) -> bool {
    cost > price
}

/// Margin health bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginState {
    /// Below 10%
    #[serde(rename = "critico")]
    Critical,
    /// Below 20%
    #[serde(rename = "bajo")]
    Low,
    /// Below 30%
    #[serde(rename = "aceptable")]
    Acceptable,
    #[serde(rename = "optimo")]
    Optimal,
}

impl MarginState {
    pub fn classify(margin: Decimal) -> Self {
        if margin < dec!(10) {
            MarginState::Critical
        } else if margin < dec!(20) {
            MarginState::Low
        } else if margin < dec!(30) {
            MarginState::Acceptable
        } else {
            MarginState::Optimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarginState::Critical => "critico",
            MarginState::Low => "bajo",
            MarginState::Acceptable => "aceptable",
            MarginState::Optimal => "optimo",
        }
    }
}

impl std::fmt::Display for MarginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price that yields `target_margin` percent over `cost`.
///
/// Targets of 100% or more cannot be reached by a finite price, so the cost is
/// doubled instead. With `round_to_tens` the price is rounded half-up to the
/// nearest ten.
pub fn suggested_price(cost: Decimal, target_margin: Decimal, round_to_tens: bool) -> Decimal {
    let raw = if target_margin >= ONE_HUNDRED {
        cost * dec!(2)
    } else {
        cost / (Decimal::ONE - target_margin / ONE_HUNDRED)
    };

    let price = if round_to_tens {
        (raw / dec!(10)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            * dec!(10)
    } else {
        raw
    };

    round_money(price)
}

/// Cost multiplied by a fixed markup factor, rounded to cents
pub fn markup_price(cost: Decimal, factor: Decimal) -> Decimal {
    round_money(cost * factor)
}

/// Percentage change between two amounts.
///
/// Growth from nothing counts as 100%; no activity in either period is 0%.
pub fn variation_percent(current: Decimal, previous: Decimal) -> Decimal {
    if previous > Decimal::ZERO {
        round_money((current - previous) / previous * ONE_HUNDRED)
    } else if current > Decimal::ZERO {
        ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Percentage increase from the current price to a suggested one
pub fn price_increase_percent(current: Decimal, suggested: Decimal) -> Decimal {
    if current <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money((suggested - current) / current * ONE_HUNDRED)
}

/// Margin of a set of products weighted by their sales amount.
///
/// Each item is `(margin_percent, sales_amount)`. Products without sales carry
/// no weight; with no sales at all the plain mean is returned.
pub fn weighted_average_margin(items: &[(Decimal, Decimal)]) -> Decimal {
    if items.is_empty() {
        return Decimal::ZERO;
    }

    let total_weight: Decimal = items.iter().map(|(_, w)| *w).sum();
    if total_weight > Decimal::ZERO {
        let weighted: Decimal = items.iter().map(|(m, w)| *m * *w).sum();
        round_money(weighted / total_weight)
    } else {
        let sum: Decimal = items.iter().map(|(m, _)| *m).sum();
        round_money(sum / Decimal::from(items.len()))
    }
}
