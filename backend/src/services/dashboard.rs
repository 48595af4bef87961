//! Dashboard: month KPIs, today's summary, recent activity and sales series

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::sales_stats::{
    daily_purchases, daily_sales, fill_days, month_to_date, previous_month, product_sales,
    purchases_total, sales_totals, DailyTotal, ProductSales,
};
use shared::{round_money, variation_percent, DateRange, StockStatus};

/// Purchases merged into the activity feed
const ACTIVITY_PURCHASES: i64 = 5;

/// Stock at or under which a top product is flagged critical
const TOP_PRODUCT_CRITICAL_STOCK: i32 = 10;

/// Points in a KPI sparkline
const SPARKLINE_DAYS: u32 = 7;

/// Dashboard service
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiCard {
    pub total: Decimal,
    pub previous: Decimal,
    pub variation_percent: Decimal,
    pub sparkline: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetProfitKpi {
    pub total: Decimal,
    pub variation_percent: Decimal,
    pub margin_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthKpis {
    pub period: DateRange,
    pub sales: KpiCard,
    pub purchases: KpiCard,
    pub net_profit: NetProfitKpi,
    /// Unread danger alerts of the requesting user
    pub danger_alerts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub sales_total: Decimal,
    pub sales_count: i64,
    pub units_sold: i64,
    pub yesterday_total: Decimal,
    pub variation_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Sale,
    Purchase,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub id: Uuid,
    pub amount: Decimal,
    /// Customer of a sale or supplier of a purchase
    pub counterpart: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    is_sale: bool,
    id: Uuid,
    amount: Decimal,
    counterpart: Option<String>,
    occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
    pub margin_percent: Decimal,
    pub stock: i32,
    pub stock_status: StockStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSeries {
    pub period: DateRange,
    pub points: Vec<DayPoint>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesByPeriod {
    #[serde(flatten)]
    pub current: PeriodSeries,
    pub previous: Option<PeriodSeries>,
    pub variation_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProductsChart {
    pub labels: Vec<String>,
    pub quantities: Vec<i64>,
    pub revenue: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub kpis: MonthKpis,
    pub today: TodaySummary,
    pub activity: Vec<ActivityItem>,
    pub top_products: Vec<TopProduct>,
    pub updated_at: DateTime<Utc>,
}

/// Dashboard stock flag: empty, at most ten units, or fine
pub fn top_product_stock_status(stock: i32) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= TOP_PRODUCT_CRITICAL_STOCK {
        StockStatus::Critical
    } else {
        StockStatus::Normal
    }
}

/// Products with sales, best revenue first
pub fn rank_top_products(products: &[ProductSales], limit: usize) -> Vec<TopProduct> {
    let mut sold: Vec<&ProductSales> = products.iter().filter(|p| p.units_sold > 0).collect();
    sold.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));

    sold.into_iter()
        .take(limit)
        .map(|p| TopProduct {
            product_id: p.product_id,
            name: p.name.clone(),
            units_sold: p.units_sold,
            revenue: round_money(p.revenue),
            margin_percent: p.margin(),
            stock: p.stock,
            stock_status: top_product_stock_status(p.stock),
        })
        .collect()
}

fn series(range: &DateRange, totals: &[DailyTotal]) -> PeriodSeries {
    let points: Vec<DayPoint> = fill_days(range, totals)
        .into_iter()
        .map(|(date, amount, count)| DayPoint {
            date,
            amount: round_money(amount),
            count,
        })
        .collect();
    let total = round_money(points.iter().map(|p| p.amount).sum());
    PeriodSeries {
        period: *range,
        points,
        total,
    }
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn overview(&self, user_id: Uuid, today: NaiveDate) -> AppResult<DashboardOverview> {
        Ok(DashboardOverview {
            kpis: self.kpis(user_id, today).await?,
            today: self.today(today).await?,
            activity: self.activity(10).await?,
            top_products: self.top_products(today, 5).await?,
            updated_at: Utc::now(),
        })
    }

    /// Month to date against the whole previous month
    pub async fn kpis(&self, user_id: Uuid, today: NaiveDate) -> AppResult<MonthKpis> {
        let month = month_to_date(today);
        let before = previous_month(today);
        let week = DateRange::last_days(today, SPARKLINE_DAYS);

        let sales = sales_totals(&self.db, &month).await?.amount;
        let sales_before = sales_totals(&self.db, &before).await?.amount;
        let purchases = purchases_total(&self.db, &month).await?;
        let purchases_before = purchases_total(&self.db, &before).await?;

        let sales_line = series(&week, &daily_sales(&self.db, &week).await?);
        let purchases_line = series(&week, &daily_purchases(&self.db, &week).await?);

        let profit = sales - purchases;
        let profit_before = sales_before - purchases_before;

        let danger_alerts: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM alerts
            WHERE user_id = $1 AND NOT is_read AND NOT is_archived AND severity = 'danger'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(MonthKpis {
            period: month,
            sales: KpiCard {
                total: round_money(sales),
                previous: round_money(sales_before),
                variation_percent: variation_percent(sales, sales_before),
                sparkline: sales_line.points.iter().map(|p| p.amount).collect(),
            },
            purchases: KpiCard {
                total: round_money(purchases),
                previous: round_money(purchases_before),
                variation_percent: variation_percent(purchases, purchases_before),
                sparkline: purchases_line.points.iter().map(|p| p.amount).collect(),
            },
            net_profit: NetProfitKpi {
                total: round_money(profit),
                variation_percent: variation_percent(profit, profit_before),
                margin_percent: if sales > Decimal::ZERO {
                    round_money(profit / sales * Decimal::from(100))
                } else {
                    Decimal::ZERO
                },
            },
            danger_alerts,
        })
    }

    pub async fn today(&self, today: NaiveDate) -> AppResult<TodaySummary> {
        let now = sales_totals(&self.db, &DateRange::new(today, today)).await?;
        let yesterday = today.pred_opt().unwrap_or(today);
        let before = sales_totals(&self.db, &DateRange::new(yesterday, yesterday)).await?;

        Ok(TodaySummary {
            date: today,
            sales_total: round_money(now.amount),
            sales_count: now.count,
            units_sold: now.units,
            yesterday_total: round_money(before.amount),
            variation_percent: variation_percent(now.amount, before.amount),
        })
    }

    /// Latest sales and purchases, newest first
    pub async fn activity(&self, limit: i64) -> AppResult<Vec<ActivityItem>> {
        let limit = limit.clamp(1, 100);
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT * FROM (
                (SELECT TRUE AS is_sale, id, total AS amount, customer_name AS counterpart,
                        sold_at AS occurred_at
                 FROM sales
                 WHERE NOT is_deleted
                 ORDER BY sold_at DESC
                 LIMIT $1)
                UNION ALL
                (SELECT FALSE, id, total, supplier, purchased_on::timestamptz
                 FROM purchases
                 WHERE is_active
                 ORDER BY purchased_on DESC, created_at DESC
                 LIMIT $2)
            ) activity
            ORDER BY occurred_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(ACTIVITY_PURCHASES)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityItem {
                kind: if row.is_sale {
                    ActivityKind::Sale
                } else {
                    ActivityKind::Purchase
                },
                id: row.id,
                amount: row.amount,
                counterpart: row.counterpart,
                occurred_at: row.occurred_at,
            })
            .collect())
    }

    /// Best-selling products of the month by revenue
    pub async fn top_products(&self, today: NaiveDate, limit: usize) -> AppResult<Vec<TopProduct>> {
        let month = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(rank_top_products(&month, limit))
    }

    /// Daily sales over the last `days` days, optionally against the period before
    pub async fn sales_by_period(
        &self,
        today: NaiveDate,
        days: u32,
        compare: bool,
    ) -> AppResult<SalesByPeriod> {
        let range = DateRange::last_days(today, days.clamp(1, 366));
        let current = series(&range, &daily_sales(&self.db, &range).await?);

        let (previous, variation) = if compare {
            let before = range.previous();
            let previous = series(&before, &daily_sales(&self.db, &before).await?);
            let variation = variation_percent(current.total, previous.total);
            (Some(previous), Some(variation))
        } else {
            (None, None)
        };

        Ok(SalesByPeriod {
            current,
            previous,
            variation_percent: variation,
        })
    }

    /// Bar chart data of the best sellers over the last `days` days
    pub async fn top_products_chart(
        &self,
        today: NaiveDate,
        days: u32,
        limit: usize,
    ) -> AppResult<TopProductsChart> {
        let products = product_sales(&self.db, &DateRange::last_days(today, days)).await?;
        let top = rank_top_products(&products, limit);

        Ok(TopProductsChart {
            labels: top.iter().map(|p| p.name.clone()).collect(),
            quantities: top.iter().map(|p| p.units_sold).collect(),
            revenue: top.iter().map(|p| p.revenue).collect(),
        })
    }
}
