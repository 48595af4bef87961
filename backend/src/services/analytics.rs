//! Financial analytics: ROI, break-even, cash flow, rotation and health

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::{rotation_report, RotationReport};
use crate::services::profitability::load_cost_settings;
use crate::services::sales_stats::{
    average_sale_prices, inventory_value, month_to_date, previous_month, product_sales,
    purchases_total, sales_totals, AveragePrice, ProductSales,
};
use shared::{
    break_even, financial_health, is_in_loss, markup_price, percent_of, price_increase_percent,
    projected_cash_flow, roi_percent, round_money, variation_percent, BreakEven, DateRange,
    HealthScore, MarginState, SALES_WINDOW_DAYS,
};

/// Markup applied to products sold at a loss
const LOSS_MARKUP: Decimal = dec!(1.15);

/// Markup applied to products with a critical margin
const CRITICAL_MARGIN_MARKUP: Decimal = dec!(1.25);

/// Analytics service
#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoiReport {
    pub period: DateRange,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub investment: Decimal,
    pub roi_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakEvenReport {
    pub month_sales: Decimal,
    pub fixed_cost_ratio: Decimal,
    #[serde(flatten)]
    pub break_even: BreakEven,
    /// Month sales as a share of the break-even amount
    pub progress_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowReport {
    pub sales_30d: Decimal,
    pub purchases_30d: Decimal,
    pub daily_net: Decimal,
    pub days: i64,
    pub projected: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub score: HealthScore,
    pub cash_flow_30d: Decimal,
    pub roi_percent: Decimal,
    pub inventory_days: Decimal,
    pub healthy_stock_percent: Decimal,
}

/// A product flagged by the profitability alert scan
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedProduct {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub stock: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfitabilityAlerts {
    pub in_loss: Vec<FlaggedProduct>,
    pub critical_margin: Vec<FlaggedProduct>,
    pub without_sales: Vec<FlaggedProduct>,
}

impl ProfitabilityAlerts {
    pub fn total(&self) -> usize {
        self.in_loss.len() + self.critical_margin.len() + self.without_sales.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceEvolution {
    pub product_id: Uuid,
    pub name: String,
    pub current_average: Option<Decimal>,
    pub previous_average: Option<Decimal>,
    pub variation_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Urgency {
    #[serde(rename = "urgente")]
    Urgent,
    #[serde(rename = "recomendado")]
    Recommended,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceRecommendation {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub suggested_price: Decimal,
    pub increase_percent: Decimal,
    pub urgency: Urgency,
    pub reason: String,
}

fn flag(product: &ProductSales) -> FlaggedProduct {
    FlaggedProduct {
        product_id: product.product_id,
        name: product.name.clone(),
        price: product.price,
        unit_cost: product.unit_cost,
        margin_percent: product.margin(),
        stock: product.stock,
    }
}

/// Sort month products into loss, critical-margin and unsold buckets.
///
/// A product in loss is not repeated in the critical bucket.
pub fn scan_profitability(month: &[ProductSales]) -> ProfitabilityAlerts {
    let mut alerts = ProfitabilityAlerts::default();
    for product in month {
        if product.price > Decimal::ZERO {
            if is_in_loss(product.price, product.unit_cost) {
                alerts.in_loss.push(flag(product));
            } else if MarginState::classify(product.margin()) == MarginState::Critical {
                alerts.critical_margin.push(flag(product));
            }
        }
        if product.units_sold == 0 {
            alerts.without_sales.push(flag(product));
        }
    }
    alerts
}

/// Compare average sale prices of two periods, product by product
pub fn price_evolution(current: &[AveragePrice], previous: &[AveragePrice]) -> Vec<PriceEvolution> {
    let before: HashMap<Uuid, &AveragePrice> =
        previous.iter().map(|p| (p.product_id, p)).collect();

    let mut rows: Vec<PriceEvolution> = current
        .iter()
        .map(|now| {
            let previous_average = before.get(&now.product_id).map(|p| p.average_price);
            PriceEvolution {
                product_id: now.product_id,
                name: now.name.clone(),
                current_average: Some(now.average_price),
                previous_average,
                variation_percent: variation_percent(
                    now.average_price,
                    previous_average.unwrap_or(Decimal::ZERO),
                ),
            }
        })
        .collect();

    let current_ids: std::collections::HashSet<Uuid> =
        current.iter().map(|p| p.product_id).collect();
    rows.extend(
        previous
            .iter()
            .filter(|p| !current_ids.contains(&p.product_id))
            .map(|p| PriceEvolution {
                product_id: p.product_id,
                name: p.name.clone(),
                current_average: None,
                previous_average: Some(p.average_price),
                variation_percent: Decimal::ZERO,
            }),
    );

    rows.sort_by(|a, b| b.variation_percent.abs().cmp(&a.variation_percent.abs()));
    rows
}

/// Markup advice for a product in loss or with a critical margin
pub fn price_recommendation(product: &ProductSales) -> Option<PriceRecommendation> {
    if product.price <= Decimal::ZERO || product.unit_cost <= Decimal::ZERO {
        return None;
    }

    let margin = product.margin();
    let (factor, urgency, reason) = if is_in_loss(product.price, product.unit_cost) {
        (
            LOSS_MARKUP,
            Urgency::Urgent,
            format!("Se vende por debajo del costo (margen {}%)", margin),
        )
    } else if MarginState::classify(margin) == MarginState::Critical {
        (
            CRITICAL_MARGIN_MARKUP,
            Urgency::Recommended,
            format!("Margen crítico de {}%", margin),
        )
    } else {
        return None;
    };

    let suggested = markup_price(product.unit_cost, factor);
    Some(PriceRecommendation {
        product_id: product.product_id,
        name: product.name.clone(),
        price: product.price,
        unit_cost: product.unit_cost,
        margin_percent: margin,
        suggested_price: suggested,
        increase_percent: price_increase_percent(product.price, suggested),
        urgency,
        reason,
    })
}

/// Mean price and cost over products that are stocked and priced
pub fn stocked_averages(products: &[ProductSales]) -> (Decimal, Decimal) {
    let stocked: Vec<&ProductSales> = products
        .iter()
        .filter(|p| p.stock > 0 && p.price > Decimal::ZERO)
        .collect();
    if stocked.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let count = Decimal::from(stocked.len());
    let price: Decimal = stocked.iter().map(|p| p.price).sum();
    let cost: Decimal = stocked.iter().map(|p| p.unit_cost).sum();
    (price / count, cost / count)
}

impl AnalyticsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Return on the current inventory over the last `days` days
    pub async fn roi(&self, today: NaiveDate, days: u32) -> AppResult<RoiReport> {
        let period = DateRange::last_days(today, days);
        let totals = sales_totals(&self.db, &period).await?;
        let investment = inventory_value(&self.db).await?;

        Ok(RoiReport {
            period,
            revenue: round_money(totals.amount),
            cogs: round_money(totals.cogs),
            gross_profit: round_money(totals.amount - totals.cogs),
            investment,
            roi_percent: roi_percent(totals.amount, totals.cogs, investment),
        })
    }

    pub async fn break_even(&self, today: NaiveDate) -> AppResult<BreakEvenReport> {
        let settings = load_cost_settings(&self.db).await?;
        let month = month_to_date(today);
        let totals = sales_totals(&self.db, &month).await?;
        let products = product_sales(&self.db, &month).await?;

        let (average_price, average_cost) = stocked_averages(&products);
        let result = break_even(
            totals.amount,
            settings.fixed_cost_ratio,
            average_price,
            average_cost,
        );

        Ok(BreakEvenReport {
            month_sales: round_money(totals.amount),
            fixed_cost_ratio: settings.fixed_cost_ratio,
            progress_percent: percent_of(totals.amount, result.sales_amount),
            break_even: result,
        })
    }

    /// Net cash of the last thirty days projected over `days`
    pub async fn cash_flow(&self, today: NaiveDate, days: i64) -> AppResult<CashFlowReport> {
        let window = DateRange::last_days(today, SALES_WINDOW_DAYS as u32);
        let sales = sales_totals(&self.db, &window).await?.amount;
        let purchases = purchases_total(&self.db, &window).await?;

        Ok(CashFlowReport {
            sales_30d: round_money(sales),
            purchases_30d: round_money(purchases),
            daily_net: projected_cash_flow(sales, purchases, 1),
            days,
            projected: projected_cash_flow(sales, purchases, days),
        })
    }

    pub async fn rotation(&self, today: NaiveDate) -> AppResult<RotationReport> {
        rotation_report(&self.db, today).await
    }

    pub async fn health(&self, today: NaiveDate) -> AppResult<HealthReport> {
        let cash = self.cash_flow(today, SALES_WINDOW_DAYS).await?;
        let roi = self.roi(today, SALES_WINDOW_DAYS as u32).await?;
        let rotation = rotation_report(&self.db, today).await?;

        let window = DateRange::last_days(today, SALES_WINDOW_DAYS as u32);
        let products = product_sales(&self.db, &window).await?;
        let healthy = products
            .iter()
            .filter(|p| !p.stock_status().needs_attention())
            .count();
        let healthy_percent = percent_of(
            Decimal::from(healthy),
            Decimal::from(products.len()),
        );

        let score = financial_health(
            cash.projected,
            roi.roi_percent,
            rotation.days_class,
            healthy_percent,
        );

        tracing::debug!(
            overall = %score.overall,
            liquidity = %score.liquidity,
            profitability = %score.profitability,
            "Financial health computed"
        );

        Ok(HealthReport {
            score,
            cash_flow_30d: cash.projected,
            roi_percent: roi.roi_percent,
            inventory_days: rotation.inventory_days,
            healthy_stock_percent: healthy_percent,
        })
    }

    pub async fn profitability_alerts(&self, today: NaiveDate) -> AppResult<ProfitabilityAlerts> {
        let month = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(scan_profitability(&month))
    }

    /// This month's average sale price of each product against last month's
    pub async fn cost_evolution(&self, today: NaiveDate) -> AppResult<Vec<PriceEvolution>> {
        let current = average_sale_prices(&self.db, &month_to_date(today)).await?;
        let previous = average_sale_prices(&self.db, &previous_month(today)).await?;
        Ok(price_evolution(&current, &previous))
    }

    pub async fn price_recommendations(
        &self,
        today: NaiveDate,
    ) -> AppResult<Vec<PriceRecommendation>> {
        let month = product_sales(&self.db, &month_to_date(today)).await?;
        let mut recommendations: Vec<PriceRecommendation> =
            month.iter().filter_map(price_recommendation).collect();
        recommendations.sort_by(|a, b| {
            a.urgency
                .cmp(&b.urgency)
                .then_with(|| a.margin_percent.cmp(&b.margin_percent))
        });
        Ok(recommendations)
    }
}
