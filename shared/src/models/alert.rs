//! Alert models and the rules that raise them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::metrics::{
    average_daily_sales, margin_percent, markup_price, DEAD_STOCK_DAYS, NEVER_SOLD_DAYS,
    SALES_WINDOW_DAYS,
};
use crate::types::round_money;

/// Margin under which a product gets a low-margin alert
pub const LOW_MARGIN_ALERT: Decimal = dec!(15);

/// Monthly units from which a product is a candidate for a price rise
pub const OPPORTUNITY_MIN_UNITS: i64 = 20;

/// Margin under which a fast seller is a candidate for a price rise
pub const OPPORTUNITY_MAX_MARGIN: Decimal = dec!(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "alert_type")
)]
pub enum AlertType {
    #[serde(rename = "stock_agotado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "stock_agotado"))]
    OutOfStock,
    #[serde(rename = "stock_critico")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "stock_critico"))]
    CriticalStock,
    #[serde(rename = "margen_negativo")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "margen_negativo"))]
    NegativeMargin,
    #[serde(rename = "margen_bajo")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "margen_bajo"))]
    LowMargin,
    #[serde(rename = "stock_muerto")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "stock_muerto"))]
    DeadStock,
    #[serde(rename = "oportunidad_venta")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "oportunidad_venta"))]
    SalesOpportunity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "alert_severity", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Success,
    Warning,
    Danger,
}

/// A stored alert addressed to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    /// Figures behind the alert (impact, suggested price, ...)
    pub data: serde_json::Value,
    pub is_read: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Recent activity of a product, as needed by the alert rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductActivity {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub stock: i32,
    pub minimum_stock: i32,
    pub units_sold_30d: i64,
    /// `None` when the product was never sold
    pub days_since_last_sale: Option<i64>,
}

/// An alert ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub product_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// Families of alert rules that can be run independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRule {
    Stock,
    Margin,
    DeadStock,
    Opportunities,
}

impl AlertRule {
    pub const ALL: [AlertRule; 4] = [
        AlertRule::Stock,
        AlertRule::Margin,
        AlertRule::DeadStock,
        AlertRule::Opportunities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertRule::Stock => "stock",
            AlertRule::Margin => "margin",
            AlertRule::DeadStock => "dead_stock",
            AlertRule::Opportunities => "opportunities",
        }
    }

    pub fn evaluate(&self, activity: &ProductActivity) -> Option<AlertDraft> {
        match self {
            AlertRule::Stock => stock_alert(activity),
            AlertRule::Margin => margin_alert(activity),
            AlertRule::DeadStock => dead_stock_alert(activity),
            AlertRule::Opportunities => opportunity_alert(activity),
        }
    }
}

impl std::str::FromStr for AlertRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(AlertRule::Stock),
            "margin" => Ok(AlertRule::Margin),
            "dead_stock" | "dead-stock" => Ok(AlertRule::DeadStock),
            "opportunities" => Ok(AlertRule::Opportunities),
            other => Err(format!("unknown alert rule: {}", other)),
        }
    }
}

fn average_daily(activity: &ProductActivity) -> Decimal {
    average_daily_sales(Decimal::from(activity.units_sold_30d), SALES_WINDOW_DAYS)
}

/// Out-of-stock and critical-stock alerts
pub fn stock_alert(activity: &ProductActivity) -> Option<AlertDraft> {
    let daily = average_daily(activity);
    let window = Decimal::from(SALES_WINDOW_DAYS);

    if activity.stock <= 0 {
        let suggested_order = (daily * window).ceil();
        return Some(AlertDraft {
            product_id: Some(activity.product_id),
            alert_type: AlertType::OutOfStock,
            severity: AlertSeverity::Danger,
            title: format!("Sin stock: {}", activity.name),
            message: format!(
                "{} está agotado. Se venden {} unidades al día en promedio.",
                activity.name,
                round_money(daily)
            ),
            data: json!({
                "average_daily_sales": round_money(daily),
                "lost_sales_30d": round_money(daily * activity.price * window),
                "suggested_order": suggested_order,
            }),
        });
    }

    if activity.stock <= activity.minimum_stock {
        let stock = Decimal::from(activity.stock);
        let days_left = if daily > Decimal::ZERO {
            Some(round_money(stock / daily))
        } else {
            None
        };
        return Some(AlertDraft {
            product_id: Some(activity.product_id),
            alert_type: AlertType::CriticalStock,
            severity: AlertSeverity::Warning,
            title: format!("Stock crítico: {}", activity.name),
            message: format!(
                "Quedan {} unidades de {} (mínimo {}).",
                activity.stock, activity.name, activity.minimum_stock
            ),
            data: json!({
                "stock": activity.stock,
                "minimum_stock": activity.minimum_stock,
                "days_left": days_left,
                "suggested_restock": activity.minimum_stock.saturating_mul(2),
                "potential_impact": round_money(activity.price * window),
            }),
        });
    }

    None
}

/// Negative and low margin alerts. Products without a price or a cost are skipped.
pub fn margin_alert(activity: &ProductActivity) -> Option<AlertDraft> {
    if activity.price <= Decimal::ZERO || activity.unit_cost <= Decimal::ZERO {
        return None;
    }

    let margin = margin_percent(activity.price, activity.unit_cost);

    if activity.unit_cost > activity.price {
        let suggested = markup_price(activity.unit_cost, dec!(1.30));
        let loss = round_money(
            (activity.price - activity.unit_cost).abs() * Decimal::from(activity.stock.max(0)),
        );
        return Some(AlertDraft {
            product_id: Some(activity.product_id),
            alert_type: AlertType::NegativeMargin,
            severity: AlertSeverity::Danger,
            title: format!("Pérdida por unidad: {}", activity.name),
            message: format!(
                "{} cuesta {} y se vende a {}. Precio sugerido: {}.",
                activity.name, activity.unit_cost, activity.price, suggested
            ),
            data: json!({
                "margin_percent": margin,
                "suggested_price": suggested,
                "stock_loss": loss,
            }),
        });
    }

    if margin < LOW_MARGIN_ALERT {
        let suggested = markup_price(activity.unit_cost, dec!(1.20));
        return Some(AlertDraft {
            product_id: Some(activity.product_id),
            alert_type: AlertType::LowMargin,
            severity: AlertSeverity::Warning,
            title: format!("Margen bajo: {}", activity.name),
            message: format!(
                "{} deja un margen de {}%. Precio sugerido: {}.",
                activity.name, margin, suggested
            ),
            data: json!({
                "margin_percent": margin,
                "suggested_price": suggested,
            }),
        });
    }

    None
}

/// Stocked products without a sale in the dead-stock window
pub fn dead_stock_alert(activity: &ProductActivity) -> Option<AlertDraft> {
    if activity.stock <= 0 {
        return None;
    }

    let days = match activity.days_since_last_sale {
        Some(days) if days < DEAD_STOCK_DAYS => return None,
        Some(days) => days,
        None => NEVER_SOLD_DAYS,
    };

    let capital = round_money(activity.unit_cost * Decimal::from(activity.stock));
    Some(AlertDraft {
        product_id: Some(activity.product_id),
        alert_type: AlertType::DeadStock,
        severity: AlertSeverity::Warning,
        title: format!("Stock sin movimiento: {}", activity.name),
        message: format!(
            "{} lleva {} días sin ventas con {} unidades en bodega.",
            activity.name, days, activity.stock
        ),
        data: json!({
            "days_without_sales": days,
            "stock": activity.stock,
            "tied_capital": capital,
        }),
    })
}

/// Fast sellers whose margin leaves room for a price rise
pub fn opportunity_alert(activity: &ProductActivity) -> Option<AlertDraft> {
    if activity.units_sold_30d < OPPORTUNITY_MIN_UNITS
        || activity.price <= Decimal::ZERO
        || activity.unit_cost <= Decimal::ZERO
    {
        return None;
    }

    let margin = margin_percent(activity.price, activity.unit_cost);
    if margin >= OPPORTUNITY_MAX_MARGIN {
        return None;
    }

    let suggested = markup_price(activity.unit_cost, dec!(1.40));
    if suggested <= activity.price {
        return None;
    }
    let extra = round_money((suggested - activity.price) * Decimal::from(activity.units_sold_30d));

    Some(AlertDraft {
        product_id: Some(activity.product_id),
        alert_type: AlertType::SalesOpportunity,
        severity: AlertSeverity::Success,
        title: format!("Oportunidad de precio: {}", activity.name),
        message: format!(
            "{} vendió {} unidades en 30 días con margen {}%. Subir a {} dejaría {} extra al mes.",
            activity.name, activity.units_sold_30d, margin, suggested, extra
        ),
        data: json!({
            "units_sold_30d": activity.units_sold_30d,
            "margin_percent": margin,
            "suggested_price": suggested,
            "extra_monthly_profit": extra,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: &serde_json::Value) -> Decimal {
        serde_json::from_value(value.clone()).unwrap()
    }

    fn activity() -> ProductActivity {
        ProductActivity {
            product_id: Uuid::new_v4(),
            name: "Maní tostado".to_string(),
            price: dec!(1000),
            unit_cost: dec!(500),
            stock: 20,
            minimum_stock: 5,
            units_sold_30d: 30,
            days_since_last_sale: Some(1),
        }
    }

    #[test]
    fn test_out_of_stock_alert() {
        let mut a = activity();
        a.stock = 0;
        let draft = stock_alert(&a).unwrap();
        assert_eq!(draft.alert_type, AlertType::OutOfStock);
        assert_eq!(draft.severity, AlertSeverity::Danger);
        assert_eq!(num(&draft.data["suggested_order"]), dec!(30));
    }

    #[test]
    fn test_critical_stock_alert() {
        let mut a = activity();
        a.stock = 5;
        let draft = stock_alert(&a).unwrap();
        assert_eq!(draft.alert_type, AlertType::CriticalStock);
        assert_eq!(draft.data["suggested_restock"], json!(10));
        assert!(stock_alert(&activity()).is_none());
    }

    #[test]
    fn test_negative_margin_alert() {
        let mut a = activity();
        a.unit_cost = dec!(1100);
        let draft = margin_alert(&a).unwrap();
        assert_eq!(draft.alert_type, AlertType::NegativeMargin);
        assert_eq!(num(&draft.data["suggested_price"]), dec!(1430));
        assert_eq!(num(&draft.data["stock_loss"]), dec!(2000));
    }

    #[test]
    fn test_low_margin_alert() {
        let mut a = activity();
        a.unit_cost = dec!(900);
        let draft = margin_alert(&a).unwrap();
        assert_eq!(draft.alert_type, AlertType::LowMargin);
        assert_eq!(num(&draft.data["suggested_price"]), dec!(1080));
    }

    #[test]
    fn test_margin_alert_needs_price_and_cost() {
        let mut a = activity();
        a.unit_cost = Decimal::ZERO;
        assert!(margin_alert(&a).is_none());
    }

    #[test]
    fn test_dead_stock_alert() {
        let mut a = activity();
        a.days_since_last_sale = Some(59);
        assert!(dead_stock_alert(&a).is_none());

        a.days_since_last_sale = Some(60);
        let draft = dead_stock_alert(&a).unwrap();
        assert_eq!(num(&draft.data["tied_capital"]), dec!(10000));

        a.days_since_last_sale = None;
        assert_eq!(dead_stock_alert(&a).unwrap().data["days_without_sales"], json!(999));
    }

    #[test]
    fn test_opportunity_alert() {
        let mut a = activity();
        a.unit_cost = dec!(750);
        // margin 25%, suggested 1050, extra (1050 - 1000) * 30
        let draft = opportunity_alert(&a).unwrap();
        assert_eq!(draft.severity, AlertSeverity::Success);
        assert_eq!(num(&draft.data["extra_monthly_profit"]), dec!(1500));

        a.units_sold_30d = 19;
        assert!(opportunity_alert(&a).is_none());
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!("dead-stock".parse::<AlertRule>().unwrap(), AlertRule::DeadStock);
        assert!("expiry".parse::<AlertRule>().is_err());
    }

    #[test]
    fn test_alert_type_labels() {
        assert_eq!(serde_json::to_string(&AlertType::OutOfStock).unwrap(), "\"stock_agotado\"");
        assert_eq!(
            serde_json::to_string(&AlertType::SalesOpportunity).unwrap(),
            "\"oportunidad_venta\""
        );
        let parsed: AlertType = serde_json::from_str("\"margen_negativo\"").unwrap();
        assert_eq!(parsed, AlertType::NegativeMargin);
        assert_eq!(serde_json::to_string(&AlertSeverity::Danger).unwrap(), "\"danger\"");
    }
}
