//! Profitability analysis: margins, low-margin impact and pricing advice

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::CostSettings;
use crate::services::sales_stats::{month_to_date, product_sales, ProductSales};
use shared::{
    is_in_loss, is_profitable, price_increase_percent, round_money, suggested_price,
    weighted_average_margin, DateRange, CRITICAL_LIST_MARGIN, LOW_MARGIN_ANALYSIS_THRESHOLD,
    SUPPLIER_COST_SHARE, TOP_SELLER_UNITS,
};

/// Number of products in the critical list
const CRITICAL_LIST_SIZE: usize = 5;

/// Number of recommendations returned
const RECOMMENDATION_LIMIT: usize = 3;

/// Read the business targets, falling back to defaults when the row is missing
pub(crate) async fn load_cost_settings<'e, E>(executor: E) -> AppResult<CostSettings>
where
    E: PgExecutor<'e>,
{
    let settings = sqlx::query_as::<_, CostSettings>(
        r#"
        SELECT target_margin, target_rotation, target_coverage_days, round_prices,
               fixed_cost_ratio, updated_at
        FROM cost_settings
        WHERE id = 1
        "#,
    )
    .fetch_optional(executor)
    .await?;
    Ok(settings.unwrap_or_default())
}

/// Profitability service
#[derive(Clone)]
pub struct ProfitabilityService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsInput {
    pub target_margin: Option<Decimal>,
    pub target_rotation: Option<Decimal>,
    pub target_coverage_days: Option<i32>,
    pub round_prices: Option<bool>,
    pub fixed_cost_ratio: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitabilitySummary {
    pub period: DateRange,
    /// Month margin weighted by each product's sales
    pub average_margin: Decimal,
    pub target_margin: Decimal,
    pub total_products: usize,
    pub profitable_products: usize,
    pub loss_products: usize,
    pub meeting_target: usize,
    pub month_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowMarginProduct {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub suggested_price: Decimal,
    pub price_increase_percent: Decimal,
    pub units_sold: i64,
    /// Extra profit this month had the suggested price applied
    pub impact: Decimal,
    pub top_seller: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalProducts {
    pub products: Vec<LowMarginProduct>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    #[serde(rename = "critica")]
    Critical,
    #[serde(rename = "alta")]
    High,
    #[serde(rename = "media")]
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub product_ids: Vec<Uuid>,
    pub impact: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductProfitability {
    pub product_id: Uuid,
    pub name: String,
    pub unit_cost: Decimal,
    pub price: Decimal,
    pub margin_percent: Decimal,
    pub in_loss: bool,
    pub meets_target: bool,
    pub units_sold: i64,
}

fn low_margin_entry(product: &ProductSales, settings: &CostSettings) -> LowMarginProduct {
    let suggested = suggested_price(product.unit_cost, settings.target_margin, settings.round_prices);
    LowMarginProduct {
        product_id: product.product_id,
        name: product.name.clone(),
        price: product.price,
        unit_cost: product.unit_cost,
        margin_percent: product.margin(),
        suggested_price: suggested,
        price_increase_percent: price_increase_percent(product.price, suggested),
        units_sold: product.units_sold,
        impact: round_money((suggested - product.price) * Decimal::from(product.units_sold)),
        top_seller: product.units_sold >= TOP_SELLER_UNITS,
    }
}

/// Products below `threshold` margin, largest monthly impact first
fn rank_low_margin(
    products: &[ProductSales],
    settings: &CostSettings,
    threshold: Decimal,
) -> Vec<LowMarginProduct> {
    let mut ranked: Vec<LowMarginProduct> = products
        .iter()
        .filter(|p| p.price > Decimal::ZERO && p.margin() < threshold)
        .map(|p| low_margin_entry(p, settings))
        .collect();
    ranked.sort_by(|a, b| b.impact.cmp(&a.impact));
    ranked
}

/// Up to one recommendation per problem family, most urgent first
pub fn build_recommendations(
    products: &[ProductSales],
    settings: &CostSettings,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let losses: Vec<&ProductSales> = products
        .iter()
        .filter(|p| p.price > Decimal::ZERO && is_in_loss(p.price, p.unit_cost))
        .collect();
    if !losses.is_empty() {
        let impact: Decimal = losses
            .iter()
            .map(|p| (p.unit_cost - p.price) * Decimal::from(p.units_sold.max(1)))
            .sum();
        recommendations.push(Recommendation {
            priority: Priority::Critical,
            kind: "fix_losses".to_string(),
            title: "Corregir productos con pérdida".to_string(),
            message: format!(
                "{} producto(s) se venden por debajo de su costo",
                losses.len()
            ),
            product_ids: losses.iter().map(|p| p.product_id).collect(),
            impact: round_money(impact),
        });
    }

    let underpriced_sellers: Vec<&ProductSales> = products
        .iter()
        .filter(|p| {
            p.price > Decimal::ZERO
                && p.units_sold >= TOP_SELLER_UNITS
                && p.margin() < CRITICAL_LIST_MARGIN
        })
        .collect();
    if !underpriced_sellers.is_empty() {
        let impact: Decimal = underpriced_sellers
            .iter()
            .map(|p| low_margin_entry(p, settings).impact.max(Decimal::ZERO))
            .sum();
        recommendations.push(Recommendation {
            priority: Priority::High,
            kind: "raise_top_seller_prices".to_string(),
            title: "Ajustar precios de los más vendidos".to_string(),
            message: format!(
                "{} producto(s) muy vendidos tienen margen menor a {}%",
                underpriced_sellers.len(),
                CRITICAL_LIST_MARGIN
            ),
            product_ids: underpriced_sellers.iter().map(|p| p.product_id).collect(),
            impact: round_money(impact),
        });
    }

    let expensive_supply: Vec<&ProductSales> = products
        .iter()
        .filter(|p| p.price > Decimal::ZERO && p.unit_cost > p.price * SUPPLIER_COST_SHARE)
        .collect();
    if !expensive_supply.is_empty() {
        let impact: Decimal = expensive_supply
            .iter()
            .map(|p| (p.unit_cost - p.price * SUPPLIER_COST_SHARE) * Decimal::from(p.units_sold))
            .sum();
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            kind: "renegotiate_suppliers".to_string(),
            title: "Renegociar con proveedores".to_string(),
            message: format!(
                "{} producto(s) tienen un costo mayor al {}% del precio",
                expensive_supply.len(),
                SUPPLIER_COST_SHARE * Decimal::from(100)
            ),
            product_ids: expensive_supply.iter().map(|p| p.product_id).collect(),
            impact: round_money(impact),
        });
    }

    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(RECOMMENDATION_LIMIT);
    recommendations
}

impl ProfitabilityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn settings(&self) -> AppResult<CostSettings> {
        load_cost_settings(&self.db).await
    }

    pub async fn update_settings(&self, input: UpdateSettingsInput) -> AppResult<CostSettings> {
        if let Some(margin) = input.target_margin {
            if margin < Decimal::ZERO || margin >= Decimal::from(100) {
                return Err(AppError::validation(
                    "target_margin",
                    "Target margin must be between 0 and 100",
                    "El margen objetivo debe estar entre 0 y 100",
                ));
            }
        }
        if matches!(input.target_rotation, Some(r) if r <= Decimal::ZERO) {
            return Err(AppError::validation(
                "target_rotation",
                "Target rotation must be positive",
                "La rotación objetivo debe ser positiva",
            ));
        }
        if matches!(input.target_coverage_days, Some(d) if d <= 0) {
            return Err(AppError::validation(
                "target_coverage_days",
                "Target coverage must be at least one day",
                "La cobertura objetivo debe ser de al menos un día",
            ));
        }
        if matches!(input.fixed_cost_ratio, Some(r) if r < Decimal::ZERO || r > Decimal::ONE) {
            return Err(AppError::validation(
                "fixed_cost_ratio",
                "Fixed cost ratio must be between 0 and 1",
                "La proporción de costos fijos debe estar entre 0 y 1",
            ));
        }

        sqlx::query("INSERT INTO cost_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(&self.db)
            .await?;

        let settings = sqlx::query_as::<_, CostSettings>(
            r#"
            UPDATE cost_settings
            SET target_margin = COALESCE($1, target_margin),
                target_rotation = COALESCE($2, target_rotation),
                target_coverage_days = COALESCE($3, target_coverage_days),
                round_prices = COALESCE($4, round_prices),
                fixed_cost_ratio = COALESCE($5, fixed_cost_ratio),
                updated_at = NOW()
            WHERE id = 1
            RETURNING target_margin, target_rotation, target_coverage_days, round_prices,
                      fixed_cost_ratio, updated_at
            "#,
        )
        .bind(input.target_margin)
        .bind(input.target_rotation)
        .bind(input.target_coverage_days)
        .bind(input.round_prices)
        .bind(input.fixed_cost_ratio)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            target_margin = %settings.target_margin,
            target_rotation = %settings.target_rotation,
            "Cost settings updated"
        );
        Ok(settings)
    }

    pub async fn summary(&self, today: NaiveDate) -> AppResult<ProfitabilitySummary> {
        let period = month_to_date(today);
        let settings = self.settings().await?;
        let products = product_sales(&self.db, &period).await?;

        let priced: Vec<&ProductSales> = products
            .iter()
            .filter(|p| p.price > Decimal::ZERO)
            .collect();
        let weighted: Vec<(Decimal, Decimal)> =
            priced.iter().map(|p| (p.margin(), p.revenue)).collect();

        Ok(ProfitabilitySummary {
            period,
            average_margin: weighted_average_margin(&weighted),
            target_margin: settings.target_margin,
            total_products: products.len(),
            profitable_products: priced
                .iter()
                .filter(|p| is_profitable(p.price, p.unit_cost))
                .count(),
            loss_products: priced
                .iter()
                .filter(|p| is_in_loss(p.price, p.unit_cost))
                .count(),
            meeting_target: priced
                .iter()
                .filter(|p| settings.meets_target(p.margin()))
                .count(),
            month_revenue: round_money(products.iter().map(|p| p.revenue).sum()),
        })
    }

    pub async fn low_margin(&self, today: NaiveDate) -> AppResult<Vec<LowMarginProduct>> {
        let settings = self.settings().await?;
        let products = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(rank_low_margin(
            &products,
            &settings,
            LOW_MARGIN_ANALYSIS_THRESHOLD,
        ))
    }

    /// Lowest-margin products under the critical threshold
    pub async fn critical(&self, today: NaiveDate) -> AppResult<CriticalProducts> {
        let settings = self.settings().await?;
        let products = product_sales(&self.db, &month_to_date(today)).await?;

        let mut critical = rank_low_margin(&products, &settings, CRITICAL_LIST_MARGIN);
        critical.sort_by(|a, b| a.margin_percent.cmp(&b.margin_percent));
        let total = critical.len();
        critical.truncate(CRITICAL_LIST_SIZE);

        Ok(CriticalProducts {
            products: critical,
            total,
        })
    }

    pub async fn recommendations(&self, today: NaiveDate) -> AppResult<Vec<Recommendation>> {
        let settings = self.settings().await?;
        let products = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(build_recommendations(&products, &settings))
    }

    pub async fn products(&self, today: NaiveDate) -> AppResult<Vec<ProductProfitability>> {
        let settings = self.settings().await?;
        let products = product_sales(&self.db, &month_to_date(today)).await?;

        let mut rows: Vec<ProductProfitability> = products
            .iter()
            .map(|p| ProductProfitability {
                product_id: p.product_id,
                name: p.name.clone(),
                unit_cost: p.unit_cost,
                price: p.price,
                margin_percent: p.margin(),
                in_loss: is_in_loss(p.price, p.unit_cost),
                meets_target: settings.meets_target(p.margin()),
                units_sold: p.units_sold,
            })
            .collect();
        rows.sort_by(|a, b| a.margin_percent.cmp(&b.margin_percent));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_priority_labels_keep_order() {
        assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"critica\"");
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"media\"");
        assert!(Priority::Critical < Priority::High);
    }

    fn product(name: &str, price: Decimal, cost: Decimal, units: i64) -> ProductSales {
        ProductSales {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            category: None,
            price,
            unit_cost: cost,
            stock: 10,
            minimum_stock: 5,
            units_sold: units,
            revenue: price * Decimal::from(units),
            cogs: cost * Decimal::from(units),
        }
    }

    #[test]
    fn test_low_margin_ranked_by_impact() {
        let settings = CostSettings::default();
        let products = vec![
            product("Té verde", dec!(1000), dec!(900), 2),
            product("Avena", dec!(1000), dec!(850), 40),
            product("Chía", dec!(1000), dec!(300), 50),
        ];

        let ranked = rank_low_margin(&products, &settings, LOW_MARGIN_ANALYSIS_THRESHOLD);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Avena");
        assert!(ranked[0].top_seller);
        assert!(!ranked[1].top_seller);
        assert!(ranked[0].impact > ranked[1].impact);
    }

    #[test]
    fn test_recommendations_by_priority() {
        let settings = CostSettings::default();
        let products = vec![
            product("Harina de almendra", dec!(1000), dec!(1200), 3),
            product("Granola", dec!(1000), dec!(800), 25),
        ];

        let recs = build_recommendations(&products, &settings);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].priority, Priority::Critical);
        assert_eq!(recs[1].priority, Priority::High);
        assert_eq!(recs[2].priority, Priority::Medium);
        assert_eq!(recs[0].product_ids.len(), 1);
    }

    #[test]
    fn test_no_recommendations_for_healthy_catalog() {
        let settings = CostSettings::default();
        let products = vec![product("Granola", dec!(1000), dec!(400), 25)];
        assert!(build_recommendations(&products, &settings).is_empty());
    }
}
