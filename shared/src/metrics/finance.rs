//! Return, break-even, cash flow and financial health calculations

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::stock::InventoryDaysClass;
use crate::types::round_money;

/// Default share of monthly sales assumed to be fixed costs
pub const DEFAULT_FIXED_COST_RATIO: Decimal = dec!(0.15);

const ONE_HUNDRED: Decimal = dec!(100);

/// Return on the inventory investment, as a percentage
pub fn roi_percent(revenue: Decimal, cogs: Decimal, investment: Decimal) -> Decimal {
    if investment <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money((revenue - cogs) / investment * ONE_HUNDRED)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEven {
    pub fixed_costs: Decimal,
    pub average_price: Decimal,
    pub average_cost: Decimal,
    pub unit_contribution: Decimal,
    pub units: Decimal,
    pub sales_amount: Decimal,
}

/// Units and sales needed to cover the fixed costs.
///
/// Fixed costs are estimated as `fixed_cost_ratio` of the month's sales. With
/// a non-positive unit contribution the point is unreachable and reported as 0.
pub fn break_even(
    month_sales: Decimal,
    fixed_cost_ratio: Decimal,
    average_price: Decimal,
    average_cost: Decimal,
) -> BreakEven {
    let fixed_costs = round_money(month_sales * fixed_cost_ratio);
    let unit_contribution = average_price - average_cost;
    let units = if unit_contribution > Decimal::ZERO {
        round_money(fixed_costs / unit_contribution)
    } else {
        Decimal::ZERO
    };

    BreakEven {
        fixed_costs,
        average_price: round_money(average_price),
        average_cost: round_money(average_cost),
        unit_contribution: round_money(unit_contribution),
        units,
        sales_amount: round_money(units * average_price),
    }
}

/// Net cash expected over `days` at the last thirty days' pace
pub fn projected_cash_flow(sales_30d: Decimal, purchases_30d: Decimal, days: i64) -> Decimal {
    let daily = (sales_30d - purchases_30d) / dec!(30);
    round_money(daily * Decimal::from(days))
}

/// Overall financial health band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthClass {
    #[serde(rename = "excelente")]
    Excellent,
    #[serde(rename = "buena")]
    Good,
    #[serde(rename = "regular")]
    Fair,
    #[serde(rename = "mala")]
    Poor,
}

impl HealthClass {
    pub fn classify(score: Decimal) -> Self {
        if score >= dec!(85) {
            HealthClass::Excellent
        } else if score >= dec!(70) {
            HealthClass::Good
        } else if score >= dec!(50) {
            HealthClass::Fair
        } else {
            HealthClass::Poor
        }
    }
}

pub fn liquidity_score(cash_flow: Decimal) -> Decimal {
    if cash_flow >= dec!(10000) {
        dec!(100)
    } else if cash_flow >= dec!(5000) {
        dec!(80)
    } else if cash_flow >= Decimal::ZERO {
        dec!(60)
    } else {
        dec!(30)
    }
}

pub fn profitability_score(roi: Decimal) -> Decimal {
    if roi >= dec!(30) {
        dec!(100)
    } else if roi >= dec!(20) {
        dec!(80)
    } else if roi >= dec!(10) {
        dec!(60)
    } else {
        dec!(30)
    }
}

/// Score from the share of products whose stock needs no attention
pub fn stock_health_score(healthy_percent: Decimal) -> Decimal {
    if healthy_percent >= dec!(90) {
        dec!(100)
    } else if healthy_percent >= dec!(75) {
        dec!(80)
    } else if healthy_percent >= dec!(60) {
        dec!(60)
    } else {
        dec!(30)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub liquidity: Decimal,
    pub profitability: Decimal,
    pub efficiency: Decimal,
    pub growth: Decimal,
    pub overall: Decimal,
    pub class: HealthClass,
}

/// Weighted financial health index.
///
/// Weights: liquidity 30%, profitability 35%, efficiency 20%, stock health 15%.
pub fn financial_health(
    cash_flow: Decimal,
    roi: Decimal,
    days_class: InventoryDaysClass,
    healthy_stock_percent: Decimal,
) -> HealthScore {
    let liquidity = liquidity_score(cash_flow);
    let profitability = profitability_score(roi);
    let efficiency = days_class.score();
    let growth = stock_health_score(healthy_stock_percent);

    let overall = round_money(
        liquidity * dec!(0.30)
            + profitability * dec!(0.35)
            + efficiency * dec!(0.20)
            + growth * dec!(0.15),
    );

    HealthScore {
        liquidity,
        profitability,
        efficiency,
        growth,
        overall,
        class: HealthClass::classify(overall),
    }
}

/// Share of `part` in `whole` as a percentage, 0 for an empty whole
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(part / whole * ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_class_labels() {
        assert_eq!(serde_json::to_string(&HealthClass::Excellent).unwrap(), "\"excelente\"");
        assert_eq!(serde_json::to_string(&HealthClass::Poor).unwrap(), "\"mala\"");
    }

    #[test]
    fn test_roi() {
        assert_eq!(roi_percent(dec!(1500), dec!(1000), dec!(2000)), dec!(25));
        assert_eq!(roi_percent(dec!(1500), dec!(1000), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_break_even() {
        // fixed = 10000 * 0.15 = 1500; contribution 30 - 20 = 10; units 150
        let be = break_even(dec!(10000), DEFAULT_FIXED_COST_RATIO, dec!(30), dec!(20));
        assert_eq!(be.fixed_costs, dec!(1500));
        assert_eq!(be.units, dec!(150));
        assert_eq!(be.sales_amount, dec!(4500));
    }

    #[test]
    fn test_break_even_without_contribution() {
        let be = break_even(dec!(10000), DEFAULT_FIXED_COST_RATIO, dec!(20), dec!(25));
        assert_eq!(be.units, Decimal::ZERO);
        assert_eq!(be.sales_amount, Decimal::ZERO);
    }

    #[test]
    fn test_projected_cash_flow() {
        assert_eq!(projected_cash_flow(dec!(9000), dec!(6000), 30), dec!(3000));
        assert_eq!(projected_cash_flow(dec!(3000), dec!(6000), 15), dec!(-1500));
    }

    #[test]
    fn test_sub_scores() {
        assert_eq!(liquidity_score(dec!(10000)), dec!(100));
        assert_eq!(liquidity_score(dec!(5000)), dec!(80));
        assert_eq!(liquidity_score(Decimal::ZERO), dec!(60));
        assert_eq!(liquidity_score(dec!(-1)), dec!(30));
        assert_eq!(profitability_score(dec!(19.99)), dec!(60));
        assert_eq!(stock_health_score(dec!(75)), dec!(80));
    }

    #[test]
    fn test_financial_health_weights() {
        let score = financial_health(dec!(12000), dec!(35), InventoryDaysClass::Excellent, dec!(95));
        assert_eq!(score.overall, dec!(100));
        assert_eq!(score.class, HealthClass::Excellent);

        // 60*0.30 + 30*0.35 + 60*0.20 + 30*0.15 = 18 + 10.5 + 12 + 4.5 = 45
        let poor = financial_health(Decimal::ZERO, dec!(5), InventoryDaysClass::Fair, dec!(50));
        assert_eq!(poor.overall, dec!(45));
        assert_eq!(poor.class, HealthClass::Poor);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec!(3), dec!(4)), dec!(75));
        assert_eq!(percent_of(dec!(3), Decimal::ZERO), Decimal::ZERO);
    }
}
