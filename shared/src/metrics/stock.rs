//! Stock status, coverage and rotation calculations

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

/// Days reported when coverage or inventory days are unbounded
pub const UNBOUNDED_DAYS: Decimal = dec!(999);

/// Days without sale reported for a product that was never sold
pub const NEVER_SOLD_DAYS: i64 = 999;

/// Window used to derive average daily sales
pub const SALES_WINDOW_DAYS: i64 = 30;

/// Window used to derive purchase frequency
pub const PURCHASE_WINDOW_DAYS: i64 = 90;

/// Days without a sale after which stock counts as dead
pub const DEAD_STOCK_DAYS: i64 = 60;

/// Stock level of a product relative to its minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "agotado")]
    OutOfStock,
    #[serde(rename = "critico")]
    Critical,
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "normal")]
    Normal,
}

impl StockStatus {
    pub fn classify(stock: i32, minimum: i32) -> Self {
        if stock <= 0 {
            StockStatus::OutOfStock
        } else if stock <= minimum {
            StockStatus::Critical
        } else if stock <= minimum.saturating_mul(2) {
            StockStatus::Low
        } else {
            StockStatus::Normal
        }
    }

    /// Bulk materials use fractional quantities
    pub fn classify_decimal(stock: Decimal, minimum: Decimal) -> Self {
        if stock <= Decimal::ZERO {
            StockStatus::OutOfStock
        } else if stock <= minimum {
            StockStatus::Critical
        } else if stock <= minimum * dec!(2) {
            StockStatus::Low
        } else {
            StockStatus::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "agotado",
            StockStatus::Critical => "critico",
            StockStatus::Low => "bajo",
            StockStatus::Normal => "normal",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Restock immediately",
            StockStatus::Critical => "Place a purchase order soon",
            StockStatus::Low => "Plan the next purchase",
            StockStatus::Normal => "No action needed",
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self, StockStatus::OutOfStock | StockStatus::Critical)
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Average units sold per day over a window
pub fn average_daily_sales(units_sold: Decimal, days: i64) -> Decimal {
    if days <= 0 {
        return Decimal::ZERO;
    }
    units_sold / Decimal::from(days)
}

/// Days of stock left at the current sales pace, `None` without sales
pub fn coverage_days(stock: Decimal, average_daily: Decimal) -> Option<Decimal> {
    if average_daily <= Decimal::ZERO {
        return None;
    }
    Some(round_money(stock / average_daily))
}

/// Median of a set of values. Even-sized sets average the two middle values.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / dec!(2))
    } else {
        Some(sorted[mid])
    }
}

/// Stock coverage compared with the target number of days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageState {
    #[serde(rename = "sin_stock")]
    NoStock,
    #[serde(rename = "sin_ventas")]
    NoSales,
    #[serde(rename = "critico")]
    Critical,
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "saludable")]
    Healthy,
    #[serde(rename = "exceso")]
    Excess,
}

impl CoverageState {
    pub fn classify(days: Decimal, target_days: Decimal) -> Self {
        if days < target_days * dec!(0.5) {
            CoverageState::Critical
        } else if days < target_days {
            CoverageState::Low
        } else if days > target_days * dec!(2) {
            CoverageState::Excess
        } else {
            CoverageState::Healthy
        }
    }
}

/// Coverage figure for the whole catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub days: Decimal,
    pub state: CoverageState,
}

/// Summarise per-product coverage into one catalog figure.
///
/// `coverages` holds the coverage of each product that has both stock and
/// sales. `any_stock` tells whether any product has stock at all.
pub fn summarize_coverage(
    coverages: &[Decimal],
    any_stock: bool,
    target_days: Decimal,
) -> CoverageSummary {
    if !any_stock {
        return CoverageSummary {
            days: Decimal::ZERO,
            state: CoverageState::NoStock,
        };
    }
    match median(coverages) {
        Some(days) => CoverageSummary {
            days: round_money(days),
            state: CoverageState::classify(days, target_days),
        },
        None => CoverageSummary {
            days: UNBOUNDED_DAYS,
            state: CoverageState::NoSales,
        },
    }
}

/// Seven-point trend band around a value, stepping 3% per point
pub fn trend_band(value: Decimal) -> Vec<Decimal> {
    (0..7i64)
        .map(|i| round_money(value * (Decimal::ONE + Decimal::from(i - 3) * dec!(0.03))))
        .collect()
}

/// Cost of goods sold divided by inventory value
pub fn rotation(cogs: Decimal, inventory_value: Decimal) -> Decimal {
    if inventory_value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(cogs / inventory_value)
}

/// Inventory rotation compared with the target rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationState {
    #[serde(rename = "muy_bajo")]
    VeryLow,
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "optimo")]
    Optimal,
    #[serde(rename = "alto")]
    High,
}

impl RotationState {
    pub fn classify(rotation: Decimal, target: Decimal) -> Self {
        if rotation < target * dec!(0.5) {
            RotationState::VeryLow
        } else if rotation < target {
            RotationState::Low
        } else if rotation > target * dec!(1.5) {
            RotationState::High
        } else {
            RotationState::Optimal
        }
    }
}

/// Days needed to sell the current inventory at the monthly rotation
pub fn inventory_days(rotation: Decimal) -> Decimal {
    if rotation <= Decimal::ZERO {
        return UNBOUNDED_DAYS;
    }
    round_money(Decimal::from(SALES_WINDOW_DAYS) / rotation)
}

/// Quality band for inventory days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryDaysClass {
    #[serde(rename = "excelente")]
    Excellent,
    #[serde(rename = "buena")]
    Good,
    #[serde(rename = "regular")]
    Fair,
    #[serde(rename = "mala")]
    Poor,
}

impl InventoryDaysClass {
    pub fn classify(days: Decimal) -> Self {
        if days < dec!(15) {
            InventoryDaysClass::Excellent
        } else if days < dec!(30) {
            InventoryDaysClass::Good
        } else if days < dec!(60) {
            InventoryDaysClass::Fair
        } else {
            InventoryDaysClass::Poor
        }
    }

    /// Efficiency sub-score used by the financial health index
    pub fn score(&self) -> Decimal {
        match self {
            InventoryDaysClass::Excellent => dec!(100),
            InventoryDaysClass::Good => dec!(80),
            InventoryDaysClass::Fair => dec!(60),
            InventoryDaysClass::Poor => dec!(30),
        }
    }
}

/// Whether the next raw-material purchase is due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCadenceState {
    #[serde(rename = "sin_datos")]
    NoData,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "proxima")]
    Upcoming,
    #[serde(rename = "retrasada")]
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCadence {
    pub days_since_last: Option<i64>,
    pub average_frequency_days: Option<Decimal>,
    /// Negative when the purchase is already late
    pub next_purchase_in_days: Option<Decimal>,
    pub state: PurchaseCadenceState,
}

/// Purchase rhythm from the days since the last purchase and the number of
/// purchases in the last ninety days.
pub fn purchase_cadence(days_since_last: Option<i64>, purchases_in_window: i64) -> PurchaseCadence {
    let Some(days) = days_since_last else {
        return PurchaseCadence {
            days_since_last: None,
            average_frequency_days: None,
            next_purchase_in_days: None,
            state: PurchaseCadenceState::NoData,
        };
    };

    if purchases_in_window <= 0 {
        return PurchaseCadence {
            days_since_last: Some(days),
            average_frequency_days: None,
            next_purchase_in_days: None,
            state: PurchaseCadenceState::Normal,
        };
    }

    let frequency =
        round_money(Decimal::from(PURCHASE_WINDOW_DAYS) / Decimal::from(purchases_in_window));
    let elapsed = Decimal::from(days);
    let state = if elapsed > frequency * dec!(1.5) {
        PurchaseCadenceState::Overdue
    } else if elapsed > frequency {
        PurchaseCadenceState::Upcoming
    } else {
        PurchaseCadenceState::Normal
    };

    PurchaseCadence {
        days_since_last: Some(days),
        average_frequency_days: Some(frequency),
        next_purchase_in_days: Some(frequency - elapsed),
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_boundaries() {
        assert_eq!(StockStatus::classify(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(-1, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(5, 5), StockStatus::Critical);
        assert_eq!(StockStatus::classify(10, 5), StockStatus::Low);
        assert_eq!(StockStatus::classify(11, 5), StockStatus::Normal);
    }

    #[test]
    fn test_stock_status_with_zero_minimum() {
        assert_eq!(StockStatus::classify(1, 0), StockStatus::Normal);
        assert!(StockStatus::classify(0, 0).needs_attention());
    }

    #[test]
    fn test_coverage_days() {
        assert_eq!(coverage_days(dec!(30), dec!(2)), Some(dec!(15)));
        assert_eq!(coverage_days(dec!(30), Decimal::ZERO), None);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[dec!(3), dec!(1), dec!(2)]), Some(dec!(2)));
        assert_eq!(median(&[dec!(4), dec!(1), dec!(3), dec!(2)]), Some(dec!(2.5)));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_coverage_summary_special_states() {
        let none = summarize_coverage(&[], false, dec!(30));
        assert_eq!(none.state, CoverageState::NoStock);
        assert_eq!(none.days, Decimal::ZERO);

        let unsold = summarize_coverage(&[], true, dec!(30));
        assert_eq!(unsold.state, CoverageState::NoSales);
        assert_eq!(unsold.days, UNBOUNDED_DAYS);
    }

    #[test]
    fn test_coverage_state_bands() {
        let target = dec!(30);
        assert_eq!(CoverageState::classify(dec!(14), target), CoverageState::Critical);
        assert_eq!(CoverageState::classify(dec!(15), target), CoverageState::Low);
        assert_eq!(CoverageState::classify(dec!(30), target), CoverageState::Healthy);
        assert_eq!(CoverageState::classify(dec!(60), target), CoverageState::Healthy);
        assert_eq!(CoverageState::classify(dec!(61), target), CoverageState::Excess);
    }

    #[test]
    fn test_trend_band() {
        let band = trend_band(dec!(100));
        assert_eq!(band.len(), 7);
        assert_eq!(band[0], dec!(91));
        assert_eq!(band[3], dec!(100));
        assert_eq!(band[6], dec!(109));
    }

    #[test]
    fn test_rotation_and_inventory_days() {
        assert_eq!(rotation(dec!(4000), dec!(1000)), dec!(4));
        assert_eq!(rotation(dec!(4000), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(inventory_days(dec!(3)), dec!(10));
        assert_eq!(inventory_days(Decimal::ZERO), UNBOUNDED_DAYS);
    }

    #[test]
    fn test_rotation_state() {
        let target = dec!(4);
        assert_eq!(RotationState::classify(dec!(1.9), target), RotationState::VeryLow);
        assert_eq!(RotationState::classify(dec!(3), target), RotationState::Low);
        assert_eq!(RotationState::classify(dec!(4), target), RotationState::Optimal);
        assert_eq!(RotationState::classify(dec!(6.1), target), RotationState::High);
    }

    #[test]
    fn test_inventory_days_class() {
        assert_eq!(InventoryDaysClass::classify(dec!(14.9)), InventoryDaysClass::Excellent);
        assert_eq!(InventoryDaysClass::classify(dec!(15)), InventoryDaysClass::Good);
        assert_eq!(InventoryDaysClass::classify(dec!(45)), InventoryDaysClass::Fair);
        assert_eq!(InventoryDaysClass::classify(UNBOUNDED_DAYS), InventoryDaysClass::Poor);
    }

    #[test]
    fn test_purchase_cadence() {
        // 6 purchases in 90 days: every 15 days
        let normal = purchase_cadence(Some(10), 6);
        assert_eq!(normal.average_frequency_days, Some(dec!(15)));
        assert_eq!(normal.next_purchase_in_days, Some(dec!(5)));
        assert_eq!(normal.state, PurchaseCadenceState::Normal);

        assert_eq!(purchase_cadence(Some(20), 6).state, PurchaseCadenceState::Upcoming);
        assert_eq!(purchase_cadence(Some(23), 6).state, PurchaseCadenceState::Overdue);
        assert_eq!(purchase_cadence(None, 0).state, PurchaseCadenceState::NoData);
    }

    #[test]
    fn test_purchase_cadence_without_recent_purchases() {
        // Bought once, long ago: no frequency to compare against
        let cadence = purchase_cadence(Some(120), 0);
        assert_eq!(cadence.state, PurchaseCadenceState::Normal);
        assert_eq!(cadence.average_frequency_days, None);
        assert_eq!(cadence.next_purchase_in_days, None);
    }

    #[test]
    fn test_stock_labels() {
        assert_eq!(StockStatus::classify(0, 5).as_str(), "agotado");
        assert_eq!(StockStatus::classify(5, 5).as_str(), "critico");
        assert_eq!(StockStatus::classify(10, 5).as_str(), "bajo");
        assert_eq!(serde_json::to_string(&StockStatus::OutOfStock).unwrap(), "\"agotado\"");
        assert_eq!(serde_json::to_string(&CoverageState::NoSales).unwrap(), "\"sin_ventas\"");
        assert_eq!(serde_json::to_string(&RotationState::VeryLow).unwrap(), "\"muy_bajo\"");
        assert_eq!(serde_json::to_string(&InventoryDaysClass::Fair).unwrap(), "\"regular\"");
        assert_eq!(
            serde_json::to_string(&PurchaseCadenceState::Overdue).unwrap(),
            "\"retrasada\""
        );
        let parsed: PurchaseCadenceState = serde_json::from_str("\"proxima\"").unwrap();
        assert_eq!(parsed, PurchaseCadenceState::Upcoming);
    }
}
