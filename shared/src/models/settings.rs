//! Business cost targets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::metrics::DEFAULT_FIXED_COST_RATIO;

/// Targets used by the profitability and inventory analyses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CostSettings {
    /// Desired gross margin, percent
    pub target_margin: Decimal,
    /// Desired monthly inventory rotation
    pub target_rotation: Decimal,
    pub target_coverage_days: i32,
    /// Round suggested prices to the nearest ten
    pub round_prices: bool,
    /// Share of monthly sales treated as fixed costs
    pub fixed_cost_ratio: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            target_margin: dec!(35),
            target_rotation: dec!(4),
            target_coverage_days: 30,
            round_prices: true,
            fixed_cost_ratio: DEFAULT_FIXED_COST_RATIO,
            updated_at: Utc::now(),
        }
    }
}

impl CostSettings {
    pub fn target_coverage(&self) -> Decimal {
        Decimal::from(self.target_coverage_days)
    }

    pub fn meets_target(&self, margin: Decimal) -> bool {
        margin >= self.target_margin
    }
}
