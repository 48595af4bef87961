//! Inventory KPIs: coverage, critical stock, purchase cadence, value and rotation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ProductActivity;
use crate::services::profitability::load_cost_settings;
use crate::services::sales_stats::{
    inventory_value, month_to_date, product_activity, product_sales, purchase_activity,
    sales_totals, ProductSales,
};
use shared::{
    average_daily_sales, coverage_days, inventory_days, purchase_cadence, rotation, round_money,
    summarize_coverage, trend_band, CoverageState, DateRange, InventoryDaysClass, PurchaseCadence,
    RotationState, StockStatus, DEAD_STOCK_DAYS, NEVER_SOLD_DAYS, SALES_WINDOW_DAYS,
};

/// Number of products in the critical stock list
const CRITICAL_LIST_SIZE: usize = 5;

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageKpi {
    /// Median coverage over products with stock and sales
    pub days: Decimal,
    pub state: CoverageState,
    pub target_days: i32,
    pub products_measured: usize,
    pub products_below_target: usize,
    pub sparkline: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalStockItem {
    pub product_id: Uuid,
    pub name: String,
    pub stock: i32,
    pub minimum_stock: i32,
    pub units_sold_month: i64,
    /// Sold this month, so running out costs sales
    pub important: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalStock {
    pub products: Vec<CriticalStockItem>,
    pub total: usize,
    pub important: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryValue {
    pub total_value: Decimal,
    pub products_in_stock: i64,
    pub average_per_product: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub period: DateRange,
    pub cogs: Decimal,
    pub inventory_value: Decimal,
    pub rotation: Decimal,
    pub target: Decimal,
    pub state: RotationState,
    pub inventory_days: Decimal,
    pub days_class: InventoryDaysClass,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlowMover {
    pub product_id: Uuid,
    pub name: String,
    pub stock: i32,
    pub unit_cost: Decimal,
    /// Capital tied up in the unsold stock
    pub tied_value: Decimal,
    /// 999 when the product was never sold
    pub days_without_sale: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockStatusItem {
    pub product_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub stock: i32,
    pub minimum_stock: i32,
    pub status: StockStatus,
    pub recommended_action: &'static str,
    /// `None` when nothing sold in the last thirty days
    pub coverage_days: Option<Decimal>,
}

/// Coverage of each product over the sales window, for products with stock
/// and at least one sale
pub fn product_coverages(products: &[ProductSales]) -> Vec<Decimal> {
    products
        .iter()
        .filter(|p| p.stock > 0)
        .filter_map(|p| {
            let daily = average_daily_sales(Decimal::from(p.units_sold), SALES_WINDOW_DAYS);
            coverage_days(Decimal::from(p.stock), daily)
        })
        .collect()
}

/// Products at or under their minimum but not empty, important ones first
pub fn critical_stock(month: &[ProductSales]) -> CriticalStock {
    let mut items: Vec<CriticalStockItem> = month
        .iter()
        .filter(|p| p.stock_status() == StockStatus::Critical)
        .map(|p| CriticalStockItem {
            product_id: p.product_id,
            name: p.name.clone(),
            stock: p.stock,
            minimum_stock: p.minimum_stock,
            units_sold_month: p.units_sold,
            important: p.units_sold > 0,
        })
        .collect();

    items.sort_by(|a, b| {
        b.important
            .cmp(&a.important)
            .then_with(|| a.stock.cmp(&b.stock))
            .then_with(|| a.name.cmp(&b.name))
    });

    let total = items.len();
    let important = items.iter().filter(|i| i.important).count();
    items.truncate(CRITICAL_LIST_SIZE);

    CriticalStock {
        products: items,
        total,
        important,
    }
}

/// Stocked products without a sale for at least `min_days`, largest tied value first
pub fn slow_movers(activities: &[ProductActivity], min_days: i64) -> Vec<SlowMover> {
    let mut movers: Vec<SlowMover> = activities
        .iter()
        .filter(|a| a.stock > 0)
        .filter_map(|a| {
            let days = a.days_since_last_sale.unwrap_or(NEVER_SOLD_DAYS);
            (days >= min_days).then(|| SlowMover {
                product_id: a.product_id,
                name: a.name.clone(),
                stock: a.stock,
                unit_cost: a.unit_cost,
                tied_value: round_money(a.unit_cost * Decimal::from(a.stock)),
                days_without_sale: days,
            })
        })
        .collect();
    movers.sort_by(|a, b| b.tied_value.cmp(&a.tied_value));
    movers
}

/// Rotation of the last thirty days against the business target
pub(crate) async fn rotation_report(db: &PgPool, today: NaiveDate) -> AppResult<RotationReport> {
    let settings = load_cost_settings(db).await?;
    let period = DateRange::last_days(today, SALES_WINDOW_DAYS as u32);
    let totals = sales_totals(db, &period).await?;
    let value = inventory_value(db).await?;

    let turns = rotation(totals.cogs, value);
    let days = inventory_days(turns);

    Ok(RotationReport {
        period,
        cogs: round_money(totals.cogs),
        inventory_value: value,
        rotation: turns,
        target: settings.target_rotation,
        state: RotationState::classify(turns, settings.target_rotation),
        inventory_days: days,
        days_class: InventoryDaysClass::classify(days),
    })
}

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn coverage(&self, today: NaiveDate) -> AppResult<CoverageKpi> {
        let settings = load_cost_settings(&self.db).await?;
        let window = DateRange::last_days(today, SALES_WINDOW_DAYS as u32);
        let products = product_sales(&self.db, &window).await?;

        let coverages = product_coverages(&products);
        let any_stock = products.iter().any(|p| p.stock > 0);
        let target = settings.target_coverage();
        let summary = summarize_coverage(&coverages, any_stock, target);

        Ok(CoverageKpi {
            days: summary.days,
            state: summary.state,
            target_days: settings.target_coverage_days,
            products_measured: coverages.len(),
            products_below_target: coverages.iter().filter(|d| **d < target).count(),
            sparkline: trend_band(summary.days),
        })
    }

    pub async fn critical(&self, today: NaiveDate) -> AppResult<CriticalStock> {
        let month = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(critical_stock(&month))
    }

    pub async fn purchase_cadence(&self, today: NaiveDate) -> AppResult<PurchaseCadence> {
        let (days_since_last, purchases) = purchase_activity(&self.db, today).await?;
        Ok(purchase_cadence(days_since_last, purchases))
    }

    pub async fn value(&self) -> AppResult<InventoryValue> {
        let total_value = inventory_value(&self.db).await?;
        let products_in_stock: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active AND stock > 0")
                .fetch_one(&self.db)
                .await?;

        let average_per_product = if products_in_stock > 0 {
            round_money(total_value / Decimal::from(products_in_stock))
        } else {
            Decimal::ZERO
        };

        Ok(InventoryValue {
            total_value,
            products_in_stock,
            average_per_product,
        })
    }

    pub async fn rotation(&self, today: NaiveDate) -> AppResult<RotationReport> {
        rotation_report(&self.db, today).await
    }

    pub async fn slow_movers(&self, today: NaiveDate) -> AppResult<Vec<SlowMover>> {
        let activities = product_activity(&self.db, today).await?;
        Ok(slow_movers(&activities, DEAD_STOCK_DAYS))
    }

    /// Stock status of every active product, most urgent first
    pub async fn status(&self, today: NaiveDate) -> AppResult<Vec<StockStatusItem>> {
        let window = DateRange::last_days(today, SALES_WINDOW_DAYS as u32);
        let products = product_sales(&self.db, &window).await?;

        let mut items: Vec<StockStatusItem> = products
            .iter()
            .map(|p| {
                let status = p.stock_status();
                let daily = average_daily_sales(Decimal::from(p.units_sold), SALES_WINDOW_DAYS);
                StockStatusItem {
                    product_id: p.product_id,
                    name: p.name.clone(),
                    category: p.category.clone(),
                    stock: p.stock,
                    minimum_stock: p.minimum_stock,
                    status,
                    recommended_action: status.recommended_action(),
                    coverage_days: coverage_days(Decimal::from(p.stock.max(0)), daily),
                }
            })
            .collect();

        items.sort_by_key(|i| (status_rank(i.status), i.stock));
        Ok(items)
    }
}

fn status_rank(status: StockStatus) -> u8 {
    match status {
        StockStatus::OutOfStock => 0,
        StockStatus::Critical => 1,
        StockStatus::Low => 2,
        StockStatus::Normal => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sales(name: &str, stock: i32, minimum: i32, units: i64) -> ProductSales {
        ProductSales {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            category: None,
            price: dec!(2000),
            unit_cost: dec!(1000),
            stock,
            minimum_stock: minimum,
            units_sold: units,
            revenue: dec!(2000) * Decimal::from(units),
            cogs: dec!(1000) * Decimal::from(units),
        }
    }

    #[test]
    fn test_coverages_skip_unsold_and_empty() {
        let products = vec![
            sales("Avena", 30, 5, 30),
            sales("Chía", 10, 5, 0),
            sales("Quinoa", 0, 5, 60),
        ];
        let coverages = product_coverages(&products);
        assert_eq!(coverages, vec![dec!(30)]);
    }

    #[test]
    fn test_critical_stock_puts_sold_products_first() {
        let products = vec![
            sales("Almendras", 2, 5, 0),
            sales("Nueces", 4, 5, 12),
            sales("Pasas", 0, 5, 3),
            sales("Maní", 20, 5, 3),
        ];
        let critical = critical_stock(&products);
        assert_eq!(critical.total, 2);
        assert_eq!(critical.important, 1);
        assert_eq!(critical.products[0].name, "Nueces");
        assert!(!critical.products[1].important);
    }

    #[test]
    fn test_slow_movers_include_never_sold() {
        let activity = |stock: i32, days: Option<i64>| ProductActivity {
            product_id: Uuid::new_v4(),
            name: "Harina de coco".to_string(),
            price: dec!(2500),
            unit_cost: dec!(1000),
            stock,
            minimum_stock: 2,
            units_sold_30d: 0,
            days_since_last_sale: days,
        };
        let movers = slow_movers(
            &[activity(3, None), activity(10, Some(75)), activity(5, Some(10)), activity(0, None)],
            DEAD_STOCK_DAYS,
        );
        assert_eq!(movers.len(), 2);
        assert_eq!(movers[0].tied_value, dec!(10000));
        assert_eq!(movers[1].days_without_sale, 999);
    }
}
