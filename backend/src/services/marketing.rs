//! Marketing insights: trending products, heroes, cross-selling and promotion candidates

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::inventory::slow_movers;
use crate::services::sales_stats::{month_to_date, product_activity, product_sales, ProductSales};
use shared::{percent_of, round_money, variation_percent, DateRange};

/// Weekly growth from which a product counts as trending
const TRENDING_MIN_GROWTH: Decimal = dec!(10);

/// Weekly growth from which a trending product is hot
const HOT_GROWTH: Decimal = dec!(50);

/// Co-occurrence share from which two products are related
const CROSS_SELL_MIN_SHARE: Decimal = dec!(30);

/// Co-occurrence share from which a relation is strong
const CROSS_SELL_STRONG_SHARE: Decimal = dec!(70);

/// Days without sale after which the deeper discount applies
const DEEP_DISCOUNT_AFTER_DAYS: i64 = 90;

/// Marketing service
#[derive(Clone)]
pub struct MarketingService {
    db: PgPool,
}

#[derive(Debug, Clone, FromRow)]
pub struct WeeklyUnits {
    pub product_id: Uuid,
    pub name: String,
    pub this_week: i64,
    pub last_week: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingProduct {
    pub product_id: Uuid,
    pub name: String,
    pub units_this_week: i64,
    pub units_last_week: i64,
    pub growth_percent: Decimal,
    pub hot: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeroProduct {
    pub rank: usize,
    pub product_id: Uuid,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
    pub margin_percent: Decimal,
    /// (price − cost) × units of the month
    pub total_profit: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct CoSale {
    pub product_id: Uuid,
    pub name: String,
    pub shared_sales: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedProduct {
    pub product_id: Uuid,
    pub name: String,
    pub shared_sales: i64,
    pub share_percent: Decimal,
    pub strong: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductPair {
    pub first_id: Uuid,
    pub first_name: String,
    pub second_id: Uuid,
    pub second_name: String,
    pub frequency: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CrossSelling {
    Related {
        product_id: Uuid,
        base_sales: i64,
        products: Vec<RelatedProduct>,
    },
    Pairs {
        pairs: Vec<ProductPair>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionCandidate {
    pub product_id: Uuid,
    pub name: String,
    pub stock: i32,
    pub days_without_sale: i64,
    pub tied_value: Decimal,
    pub suggested_discount_percent: Decimal,
}

/// Products whose weekly units grew at least 10%, fastest first
pub fn rank_trending(weeks: &[WeeklyUnits], limit: usize) -> Vec<TrendingProduct> {
    let mut trending: Vec<TrendingProduct> = weeks
        .iter()
        .filter(|w| w.this_week > 0)
        .filter_map(|w| {
            let growth = variation_percent(Decimal::from(w.this_week), Decimal::from(w.last_week));
            (growth >= TRENDING_MIN_GROWTH).then(|| TrendingProduct {
                product_id: w.product_id,
                name: w.name.clone(),
                units_this_week: w.this_week,
                units_last_week: w.last_week,
                growth_percent: growth,
                hot: growth >= HOT_GROWTH,
            })
        })
        .collect();
    trending.sort_by(|a, b| b.growth_percent.cmp(&a.growth_percent));
    trending.truncate(limit);
    trending
}

/// Products ranked by the profit they brought this month
pub fn rank_heroes(month: &[ProductSales], limit: usize) -> Vec<HeroProduct> {
    let mut heroes: Vec<(Decimal, &ProductSales)> = month
        .iter()
        .filter(|p| p.price > Decimal::ZERO && p.unit_cost > Decimal::ZERO && p.units_sold > 0)
        .map(|p| ((p.price - p.unit_cost) * Decimal::from(p.units_sold), p))
        .collect();
    heroes.sort_by(|a, b| b.0.cmp(&a.0));

    heroes
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (profit, p))| HeroProduct {
            rank: i + 1,
            product_id: p.product_id,
            name: p.name.clone(),
            units_sold: p.units_sold,
            revenue: round_money(p.revenue),
            margin_percent: p.margin(),
            total_profit: round_money(profit),
        })
        .collect()
}

/// Products sold together with a base product in at least 30% of its sales
pub fn related_products(base_sales: i64, co_sales: &[CoSale], limit: usize) -> Vec<RelatedProduct> {
    if base_sales <= 0 {
        return Vec::new();
    }
    let mut related: Vec<RelatedProduct> = co_sales
        .iter()
        .filter_map(|c| {
            let share = percent_of(Decimal::from(c.shared_sales), Decimal::from(base_sales));
            (share >= CROSS_SELL_MIN_SHARE).then(|| RelatedProduct {
                product_id: c.product_id,
                name: c.name.clone(),
                shared_sales: c.shared_sales,
                share_percent: share,
                strong: share >= CROSS_SELL_STRONG_SHARE,
            })
        })
        .collect();
    related.sort_by(|a, b| b.share_percent.cmp(&a.share_percent));
    related.truncate(limit);
    related
}

pub fn suggested_discount(days_without_sale: i64) -> Decimal {
    if days_without_sale > DEEP_DISCOUNT_AFTER_DAYS {
        dec!(25)
    } else {
        dec!(15)
    }
}

impl MarketingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Units of the last seven days against the seven before
    pub async fn trending(&self, today: NaiveDate, limit: usize) -> AppResult<Vec<TrendingProduct>> {
        let week = DateRange::last_days(today, 7);
        let before = week.previous();

        let weeks = sqlx::query_as::<_, WeeklyUnits>(
            r#"
            SELECT p.id AS product_id, p.name,
                   COALESCE(SUM(sl.quantity) FILTER (WHERE s.sold_at::date BETWEEN $1 AND $2), 0)::BIGINT
                       AS this_week,
                   COALESCE(SUM(sl.quantity) FILTER (WHERE s.sold_at::date BETWEEN $3 AND $4), 0)::BIGINT
                       AS last_week
            FROM sale_lines sl
            JOIN sales s ON s.id = sl.sale_id
            JOIN products p ON p.id = sl.product_id
            WHERE NOT s.is_deleted AND s.sold_at::date BETWEEN $3 AND $2
            GROUP BY p.id, p.name
            "#,
        )
        .bind(week.start)
        .bind(week.end)
        .bind(before.start)
        .bind(before.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rank_trending(&weeks, limit))
    }

    pub async fn heroes(&self, today: NaiveDate, limit: usize) -> AppResult<Vec<HeroProduct>> {
        let month = product_sales(&self.db, &month_to_date(today)).await?;
        Ok(rank_heroes(&month, limit))
    }

    /// Products bought together with `product_id`, or the most frequent pairs
    pub async fn cross_selling(
        &self,
        product_id: Option<Uuid>,
        limit: usize,
    ) -> AppResult<CrossSelling> {
        let limit = limit.clamp(1, 50);

        let Some(product_id) = product_id else {
            let pairs = sqlx::query_as::<_, ProductPair>(
                r#"
                SELECT a.product_id AS first_id, pa.name AS first_name,
                       b.product_id AS second_id, pb.name AS second_name,
                       COUNT(DISTINCT a.sale_id) AS frequency
                FROM sale_lines a
                JOIN sale_lines b ON b.sale_id = a.sale_id AND a.product_id < b.product_id
                JOIN sales s ON s.id = a.sale_id
                JOIN products pa ON pa.id = a.product_id
                JOIN products pb ON pb.id = b.product_id
                WHERE NOT s.is_deleted
                GROUP BY a.product_id, pa.name, b.product_id, pb.name
                ORDER BY frequency DESC, first_name, second_name
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;
            return Ok(CrossSelling::Pairs { pairs });
        };

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Product {}", product_id)));
        }

        let base_sales: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT sl.sale_id)
            FROM sale_lines sl
            JOIN sales s ON s.id = sl.sale_id
            WHERE sl.product_id = $1 AND NOT s.is_deleted
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let co_sales = sqlx::query_as::<_, CoSale>(
            r#"
            SELECT other.product_id, p.name, COUNT(DISTINCT other.sale_id) AS shared_sales
            FROM sale_lines base
            JOIN sales s ON s.id = base.sale_id
            JOIN sale_lines other ON other.sale_id = base.sale_id AND other.product_id <> base.product_id
            JOIN products p ON p.id = other.product_id
            WHERE base.product_id = $1 AND NOT s.is_deleted
            GROUP BY other.product_id, p.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(CrossSelling::Related {
            product_id,
            base_sales,
            products: related_products(base_sales, &co_sales, limit),
        })
    }

    /// Stocked products without sales in `days` days, to be promoted
    pub async fn low_rotation(
        &self,
        today: NaiveDate,
        days: i64,
        limit: usize,
    ) -> AppResult<Vec<PromotionCandidate>> {
        let activities = product_activity(&self.db, today).await?;
        Ok(slow_movers(&activities, days.max(1))
            .into_iter()
            .take(limit)
            .map(|m| PromotionCandidate {
                product_id: m.product_id,
                name: m.name,
                stock: m.stock,
                days_without_sale: m.days_without_sale,
                tied_value: m.tied_value,
                suggested_discount_percent: suggested_discount(m.days_without_sale),
            })
            .collect())
    }
}
